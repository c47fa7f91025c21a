// src/manual/mod.rs
//
// Human-confirmed payment channel: the payer transfers the listing fee off
// platform, uploads evidence of the transfer, and a reviewer confirms or
// rejects it. Structurally a smaller sibling of the gateway state machine.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::core::{AuctionId, Errors, PaymentId, UserId};
use crate::domain::payments::Settlement;
use crate::domain::Store;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualStatus {
    Pending,
    WaitingConfirmation,
    Confirmed,
    Rejected,
}

impl ManualStatus {
    pub fn can_transition(self, next: ManualStatus) -> bool {
        use ManualStatus::*;
        matches!(
            (self, next),
            (Pending, WaitingConfirmation)
                | (WaitingConfirmation, Confirmed)
                | (WaitingConfirmation, Rejected)
                // Rejection permits a fresh evidence upload.
                | (Rejected, WaitingConfirmation)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ManualStatus::Confirmed | ManualStatus::Rejected)
    }
}

impl fmt::Display for ManualStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManualStatus::Pending => "pending",
            ManualStatus::WaitingConfirmation => "waiting_confirmation",
            ManualStatus::Confirmed => "confirmed",
            ManualStatus::Rejected => "rejected",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualPayment {
    pub id: PaymentId,
    pub auction_id: AuctionId,
    pub payer: UserId,
    pub amount: Money,
    /// Reference to the stored evidence image. Present from the first
    /// submission on.
    pub evidence: Option<String>,
    /// Handle of the outbound reviewer notification, if one was delivered.
    pub notice_handle: Option<i64>,
    pub reject_reason: Option<String>,
    pub status: ManualStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl ManualPayment {
    pub fn new(
        id: PaymentId,
        auction_id: AuctionId,
        payer: UserId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Self {
        ManualPayment {
            id,
            auction_id,
            payer,
            amount,
            evidence: None,
            notice_handle: None,
            reject_reason: None,
            status: ManualStatus::Pending,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
        }
    }

    fn transition(&mut self, next: ManualStatus, now: DateTime<Utc>) -> Result<(), Errors> {
        if !self.status.can_transition(next) {
            return Err(Errors::IllegalTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Records uploaded evidence and queues the payment for review. Refused
    /// once paid, and while a previous submission is still under review.
    pub fn submit_evidence(&mut self, evidence: String, now: DateTime<Utc>) -> Result<(), Errors> {
        match self.status {
            ManualStatus::Confirmed => return Err(Errors::PaymentAlreadySettled(self.id)),
            ManualStatus::WaitingConfirmation => {
                return Err(Errors::EvidenceAlreadyPending(self.id))
            }
            ManualStatus::Pending | ManualStatus::Rejected => {}
        }
        self.evidence = Some(evidence);
        self.reject_reason = None;
        self.transition(ManualStatus::WaitingConfirmation, now)
    }

    fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), Errors> {
        if self.status != ManualStatus::WaitingConfirmation {
            return Err(Errors::PaymentNotAwaitingReview {
                payment_id: self.id,
                status: self.status.to_string(),
            });
        }
        self.transition(ManualStatus::Confirmed, now)?;
        self.confirmed_at = Some(now);
        Ok(())
    }

    fn reject(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), Errors> {
        if self.status != ManualStatus::WaitingConfirmation {
            return Err(Errors::PaymentNotAwaitingReview {
                payment_id: self.id,
                status: self.status.to_string(),
            });
        }
        self.transition(ManualStatus::Rejected, now)?;
        self.reject_reason = Some(reason);
        Ok(())
    }
}

impl Settlement for ManualPayment {
    fn payer(&self) -> &UserId {
        &self.payer
    }

    fn amount(&self) -> Money {
        self.amount
    }

    fn is_settled(&self) -> bool {
        self.status == ManualStatus::Confirmed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Confirm,
    Reject,
}

/// What a reviewer decision callback did. Duplicate decisions against an
/// already-terminal payment are a no-op, reported distinctly so the
/// callback channel can answer "already processed" instead of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    Applied(ManualStatus),
    AlreadyProcessed(ManualStatus),
}

/// Applies a reviewer decision. Confirmation settles the payment and marks
/// the owning auction paid; rejection only records the reason.
pub fn decide(
    store: &mut Store,
    payment_id: PaymentId,
    decision: Decision,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<DecisionOutcome, Errors> {
    let payment = store
        .manual_payments
        .get_mut(&payment_id)
        .ok_or(Errors::UnknownPayment(payment_id))?;

    if payment.status.is_terminal() {
        return Ok(DecisionOutcome::AlreadyProcessed(payment.status));
    }

    match decision {
        Decision::Confirm => {
            let auction_id = payment.auction_id;
            payment.confirm(now)?;
            if let Some(auction) = store.auctions.get_mut(&auction_id) {
                auction.mark_paid(now);
            }
            Ok(DecisionOutcome::Applied(ManualStatus::Confirmed))
        }
        Decision::Reject => {
            let reason = reason.unwrap_or_else(|| "Rejected by reviewer".to_string());
            payment.reject(reason, now)?;
            Ok(DecisionOutcome::Applied(ManualStatus::Rejected))
        }
    }
}
