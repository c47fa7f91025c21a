// src/domain/auctions.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::bids::Bid;
use super::core::{AuctionId, BidId, Errors, ListingId, UserId};
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    PendingPayment,
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl AuctionStatus {
    /// The only legal moves. Every status write goes through
    /// [`Auction::transition`], so illegal moves are rejected in one place
    /// instead of at every call site.
    pub fn can_transition(self, next: AuctionStatus) -> bool {
        use AuctionStatus::*;
        matches!(
            (self, next),
            (PendingPayment, Scheduled)
                | (PendingPayment, Cancelled)
                | (Scheduled, Active)
                | (Scheduled, Cancelled)
                | (Active, Completed)
        )
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuctionStatus::PendingPayment => "pending_payment",
            AuctionStatus::Scheduled => "scheduled",
            AuctionStatus::Active => "active",
            AuctionStatus::Completed => "completed",
            AuctionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Termination rule, fixed at creation. The required bounds are part of the
/// variant, so an auction without a configured end condition cannot be
/// represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndCondition {
    ByTime { end_time: DateTime<Utc> },
    ByPrice { target_price: Money },
    ByTimeOrPrice {
        end_time: DateTime<Utc>,
        target_price: Money,
    },
}

impl EndCondition {
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        match self {
            EndCondition::ByTime { end_time } => Some(*end_time),
            EndCondition::ByPrice { .. } => None,
            EndCondition::ByTimeOrPrice { end_time, .. } => Some(*end_time),
        }
    }

    pub fn target_price(&self) -> Option<Money> {
        match self {
            EndCondition::ByTime { .. } => None,
            EndCondition::ByPrice { target_price } => Some(*target_price),
            EndCondition::ByTimeOrPrice { target_price, .. } => Some(*target_price),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub listing_id: ListingId,
    pub organizer: UserId,
    pub start_price: Money,
    pub current_price: Money,
    pub end_condition: EndCondition,
    pub start_time: DateTime<Utc>,
    pub status: AuctionStatus,
    pub winner: Option<UserId>,
    pub winning_bid: Option<BidId>,
    pub is_paid: bool,
    pub payment_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub bids: Vec<Bid>,
}

/// Validated creation parameters; see [`validate_end_condition`].
#[derive(Debug, Clone)]
pub struct AuctionSpec {
    pub listing_id: ListingId,
    pub organizer: UserId,
    pub start_price: Money,
    pub start_time: DateTime<Utc>,
    pub end_condition: EndCondition,
}

/// Checks the bounds of a requested end condition against the start
/// time/price. Missing fields never get here: the wire layer fails to
/// construct the `EndCondition` variant without them.
pub fn validate_end_condition(
    end_condition: &EndCondition,
    start_time: DateTime<Utc>,
    start_price: Money,
) -> Result<(), Errors> {
    if let Some(end_time) = end_condition.end_time() {
        if end_time <= start_time {
            return Err(Errors::EndTimeNotAfterStart);
        }
    }
    if let Some(target_price) = end_condition.target_price() {
        if target_price <= start_price {
            return Err(Errors::TargetPriceNotAboveStart);
        }
    }
    Ok(())
}

impl Auction {
    pub fn create(id: AuctionId, spec: AuctionSpec, fee: Money, now: DateTime<Utc>) -> Result<Self, Errors> {
        validate_end_condition(&spec.end_condition, spec.start_time, spec.start_price)?;

        Ok(Auction {
            id,
            listing_id: spec.listing_id,
            organizer: spec.organizer,
            start_price: spec.start_price,
            current_price: spec.start_price,
            end_condition: spec.end_condition,
            start_time: spec.start_time,
            status: AuctionStatus::PendingPayment,
            winner: None,
            winning_bid: None,
            is_paid: false,
            payment_amount: fee,
            created_at: now,
            updated_at: now,
            bids: Vec::new(),
        })
    }

    pub fn transition(&mut self, next: AuctionStatus, now: DateTime<Utc>) -> Result<(), Errors> {
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

    /// Shared side effect of both payment channels: the auction becomes
    /// payable once and advances out of `pending_payment` without ever
    /// regressing an auction that already went further.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) {
        self.is_paid = true;
        if self.status == AuctionStatus::PendingPayment {
            // Transition is legal from pending_payment by the table above.
            let _ = self.transition(AuctionStatus::Scheduled, now);
        } else {
            self.updated_at = now;
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.status != AuctionStatus::Active {
            return false;
        }
        if self.start_time > now {
            return false;
        }
        match &self.end_condition {
            EndCondition::ByTime { end_time } => now <= *end_time,
            EndCondition::ByPrice { target_price } => self.current_price < *target_price,
            EndCondition::ByTimeOrPrice {
                end_time,
                target_price,
            } => now <= *end_time && self.current_price < *target_price,
        }
    }

    pub fn should_end(&self, now: DateTime<Utc>) -> bool {
        if self.status != AuctionStatus::Active {
            return false;
        }
        match &self.end_condition {
            EndCondition::ByTime { end_time } => now > *end_time,
            EndCondition::ByPrice { target_price } => self.current_price >= *target_price,
            EndCondition::ByTimeOrPrice {
                end_time,
                target_price,
            } => now > *end_time || self.current_price >= *target_price,
        }
    }

    /// Finalizes a due auction. No-op unless the termination condition
    /// holds, and idempotent once completed. An auction without bids still
    /// completes, with no winner.
    pub fn determine_winner(&mut self, now: DateTime<Utc>) -> Result<(), Errors> {
        if self.status == AuctionStatus::Completed || !self.should_end(now) {
            return Ok(());
        }

        // Highest amount wins; ties break to the earliest accepted bid.
        // Accepted amounts are strictly increasing so a tie cannot happen,
        // but the rule keeps the selection total.
        let winning = self
            .bids
            .iter()
            .max_by(|a, b| a.amount.cmp(&b.amount).then(b.at.cmp(&a.at).then(b.id.cmp(&a.id))))
            .cloned();

        if let Some(bid) = winning {
            self.winner = Some(bid.bidder.clone());
            self.winning_bid = Some(bid.id);
            self.current_price = bid.amount;
        }

        self.transition(AuctionStatus::Completed, now)
    }
}
