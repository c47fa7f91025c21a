// src/gateway/mod.rs
//
// Two-phase payment confirmation protocol for the automated gateway
// channel. The gateway calls back twice per payment: `prepare` (action 0)
// asks whether the payment can be taken, `complete` (action 1) reports the
// outcome. Field names and numeric error codes on the wire are an external
// contract and must not change.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::core::{AuctionId, Errors, PaymentId, UserId};
use crate::domain::payments::Settlement;
use crate::domain::Store;
use crate::money::Money;

pub const ACTION_PREPARE: i32 = 0;
pub const ACTION_COMPLETE: i32 = 1;

/// Credentials issued by the gateway for this merchant. Injected into the
/// protocol functions rather than read from ambient state.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub service_id: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl GatewayStatus {
    pub fn can_transition(self, next: GatewayStatus) -> bool {
        use GatewayStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }

    pub fn is_open(self) -> bool {
        matches!(self, GatewayStatus::Pending | GatewayStatus::Processing)
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayStatus::Pending => "pending",
            GatewayStatus::Processing => "processing",
            GatewayStatus::Completed => "completed",
            GatewayStatus::Failed => "failed",
            GatewayStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: PaymentId,
    pub auction_id: AuctionId,
    pub payer: UserId,
    pub amount: Money,
    /// Our opaque token correlating both callback phases. Globally unique.
    pub merchant_trans_id: String,
    pub gateway_trans_id: Option<String>,
    pub gateway_doc_id: Option<String>,
    pub status: GatewayStatus,
    pub error_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub fn new_merchant_trans_id() -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!("AUCTION_{}", token[..20].to_uppercase())
}

impl GatewayPayment {
    pub fn new(
        id: PaymentId,
        auction_id: AuctionId,
        payer: UserId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Self {
        GatewayPayment {
            id,
            auction_id,
            payer,
            amount,
            merchant_trans_id: new_merchant_trans_id(),
            gateway_trans_id: None,
            gateway_doc_id: None,
            status: GatewayStatus::Pending,
            error_note: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn transition(&mut self, next: GatewayStatus, now: DateTime<Utc>) -> Result<(), Errors> {
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

    fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), Errors> {
        self.transition(GatewayStatus::Completed, now)?;
        self.completed_at = Some(now);
        Ok(())
    }

    fn mark_failed(&mut self, note: String, now: DateTime<Utc>) -> Result<(), Errors> {
        self.transition(GatewayStatus::Failed, now)?;
        self.error_note = Some(note);
        Ok(())
    }

    /// Used by the unpaid-auction sweep; a cancelled payment answers any
    /// late gateway callback with -9. Returns whether anything changed.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.status.is_open() {
            let _ = self.transition(GatewayStatus::Cancelled, now);
            true
        } else {
            false
        }
    }
}

impl Settlement for GatewayPayment {
    fn payer(&self) -> &UserId {
        &self.payer
    }

    fn amount(&self) -> Money {
        self.amount
    }

    fn is_settled(&self) -> bool {
        self.status == GatewayStatus::Completed
    }
}

/// MD5 over the order-sensitive concatenation the gateway signs with.
pub fn signature(cfg: &GatewayConfig, gateway_trans_id: &str, merchant_trans_id: &str) -> String {
    let input = format!(
        "{}{}{}{}",
        gateway_trans_id, cfg.service_id, cfg.secret_key, merchant_trans_id
    );
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Every way a callback can be refused, with the gateway's numeric code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    SignCheckFailed,
    IncorrectAmount,
    ActionNotFound,
    AlreadyPaid,
    ServiceIdMismatch,
    TransactionNotFound,
    TransactionFailed,
    Internal(String),
    TransactionCancelled,
}

impl Rejection {
    pub fn code(&self) -> i32 {
        match self {
            Rejection::SignCheckFailed => -1,
            Rejection::IncorrectAmount => -2,
            Rejection::ActionNotFound => -3,
            Rejection::AlreadyPaid => -4,
            Rejection::ServiceIdMismatch | Rejection::TransactionNotFound => -5,
            Rejection::TransactionFailed => -6,
            Rejection::Internal(_) => -8,
            Rejection::TransactionCancelled => -9,
        }
    }

    pub fn note(&self) -> String {
        match self {
            Rejection::SignCheckFailed => "Sign check failed".to_string(),
            Rejection::IncorrectAmount => "Incorrect amount".to_string(),
            Rejection::ActionNotFound => "Action not found".to_string(),
            Rejection::AlreadyPaid => "Already paid".to_string(),
            Rejection::ServiceIdMismatch => "Service ID is incorrect".to_string(),
            Rejection::TransactionNotFound => "Transaction does not exist".to_string(),
            Rejection::TransactionFailed => "Transaction cancelled".to_string(),
            Rejection::Internal(note) => format!("Error: {}", note),
            Rejection::TransactionCancelled => "Transaction cancelled".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub gateway_transaction_id: String,
    pub service_id: String,
    pub gateway_document_id: String,
    pub merchant_transaction_id: String,
    pub amount: Money,
    pub action: i32,
    pub sign_time: String,
    pub sign_string: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub gateway_transaction_id: String,
    pub service_id: String,
    pub gateway_document_id: String,
    pub merchant_transaction_id: String,
    pub merchant_prepare_id: PaymentId,
    pub amount: Money,
    pub action: i32,
    pub sign_time: String,
    pub sign_string: String,
    pub error: i32,
}

/// The exact response shape the gateway expects on every call, success or
/// not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub gateway_transaction_id: String,
    pub merchant_transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_prepare_id: Option<PaymentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_confirm_id: Option<PaymentId>,
    pub error: i32,
    pub error_note: String,
}

impl GatewayResponse {
    fn base(gateway_transaction_id: &str, merchant_transaction_id: &str) -> Self {
        GatewayResponse {
            gateway_transaction_id: gateway_transaction_id.to_string(),
            merchant_transaction_id: merchant_transaction_id.to_string(),
            merchant_prepare_id: None,
            merchant_confirm_id: None,
            error: 0,
            error_note: "Success".to_string(),
        }
    }

    fn rejected(
        gateway_transaction_id: &str,
        merchant_transaction_id: &str,
        rejection: &Rejection,
    ) -> Self {
        let mut response = Self::base(gateway_transaction_id, merchant_transaction_id);
        response.error = rejection.code();
        response.error_note = rejection.note();
        response
    }

    /// For faults outside the protocol checks, e.g. a poisoned store lock.
    pub fn internal_fault(
        gateway_transaction_id: &str,
        merchant_transaction_id: &str,
        note: &str,
    ) -> Self {
        Self::rejected(
            gateway_transaction_id,
            merchant_transaction_id,
            &Rejection::Internal(note.to_string()),
        )
    }
}

fn check_envelope(
    cfg: &GatewayConfig,
    service_id: &str,
    sign_string: &str,
    gateway_transaction_id: &str,
    merchant_transaction_id: &str,
    action: i32,
    expected_action: i32,
) -> Result<(), Rejection> {
    if service_id != cfg.service_id {
        return Err(Rejection::ServiceIdMismatch);
    }
    let expected = signature(cfg, gateway_transaction_id, merchant_transaction_id);
    if sign_string != expected {
        return Err(Rejection::SignCheckFailed);
    }
    if action != expected_action {
        return Err(Rejection::ActionNotFound);
    }
    Ok(())
}

/// Phase 1: payability check. On success the payment records the gateway's
/// ids and moves to `processing`; the returned `merchant_prepare_id` is the
/// phase-2 reference. The status write is the last step, so a rejected
/// request never leaves a partial mutation behind.
pub fn prepare(
    store: &mut Store,
    cfg: &GatewayConfig,
    req: &PrepareRequest,
    now: DateTime<Utc>,
) -> GatewayResponse {
    match prepare_checks(store, cfg, req, now) {
        Ok(prepare_id) => {
            let mut response =
                GatewayResponse::base(&req.gateway_transaction_id, &req.merchant_transaction_id);
            response.merchant_prepare_id = Some(prepare_id);
            response
        }
        Err(rejection) => GatewayResponse::rejected(
            &req.gateway_transaction_id,
            &req.merchant_transaction_id,
            &rejection,
        ),
    }
}

fn prepare_checks(
    store: &mut Store,
    cfg: &GatewayConfig,
    req: &PrepareRequest,
    now: DateTime<Utc>,
) -> Result<PaymentId, Rejection> {
    check_envelope(
        cfg,
        &req.service_id,
        &req.sign_string,
        &req.gateway_transaction_id,
        &req.merchant_transaction_id,
        req.action,
        ACTION_PREPARE,
    )?;

    let payment = store
        .gateway_payment_by_merchant_mut(&req.merchant_transaction_id)
        .ok_or(Rejection::TransactionNotFound)?;

    match payment.status {
        GatewayStatus::Completed => return Err(Rejection::AlreadyPaid),
        GatewayStatus::Cancelled => return Err(Rejection::TransactionCancelled),
        _ => {}
    }

    if req.amount != payment.amount {
        return Err(Rejection::IncorrectAmount);
    }

    payment.gateway_trans_id = Some(req.gateway_transaction_id.clone());
    payment.gateway_doc_id = Some(req.gateway_document_id.clone());
    // A repeated prepare while already processing re-validates and stays
    // put; only the first one moves the status.
    if payment.status == GatewayStatus::Pending {
        payment
            .transition(GatewayStatus::Processing, now)
            .map_err(|e| Rejection::Internal(e.to_string()))?;
    } else {
        payment.updated_at = now;
    }

    Ok(payment.id)
}

/// Phase 2: confirmation. Replays against an already-completed payment are
/// answered with success and must not re-apply the auction side effect.
pub fn complete(
    store: &mut Store,
    cfg: &GatewayConfig,
    req: &CompleteRequest,
    now: DateTime<Utc>,
) -> GatewayResponse {
    match complete_checks(store, cfg, req, now) {
        Ok(CompleteOutcome::Confirmed(id)) => {
            let mut response =
                GatewayResponse::base(&req.gateway_transaction_id, &req.merchant_transaction_id);
            response.merchant_confirm_id = Some(id);
            response
        }
        Ok(CompleteOutcome::AlreadyConfirmed(id)) => {
            let mut response =
                GatewayResponse::base(&req.gateway_transaction_id, &req.merchant_transaction_id);
            response.merchant_confirm_id = Some(id);
            response.error_note = "Already confirmed".to_string();
            response
        }
        Err(rejection) => GatewayResponse::rejected(
            &req.gateway_transaction_id,
            &req.merchant_transaction_id,
            &rejection,
        ),
    }
}

enum CompleteOutcome {
    Confirmed(PaymentId),
    AlreadyConfirmed(PaymentId),
}

fn complete_checks(
    store: &mut Store,
    cfg: &GatewayConfig,
    req: &CompleteRequest,
    now: DateTime<Utc>,
) -> Result<CompleteOutcome, Rejection> {
    check_envelope(
        cfg,
        &req.service_id,
        &req.sign_string,
        &req.gateway_transaction_id,
        &req.merchant_transaction_id,
        req.action,
        ACTION_COMPLETE,
    )?;

    let payment = store
        .gateway_payment_by_merchant_mut(&req.merchant_transaction_id)
        .filter(|p| p.id == req.merchant_prepare_id)
        .ok_or(Rejection::TransactionNotFound)?;

    match payment.status {
        GatewayStatus::Completed => return Ok(CompleteOutcome::AlreadyConfirmed(payment.id)),
        GatewayStatus::Cancelled => return Err(Rejection::TransactionCancelled),
        _ => {}
    }

    if req.amount != payment.amount {
        return Err(Rejection::IncorrectAmount);
    }

    if req.error < 0 {
        payment
            .mark_failed(format!("Gateway error: {}", req.error), now)
            .map_err(|e| Rejection::Internal(e.to_string()))?;
        return Err(Rejection::TransactionFailed);
    }

    let payment_id = payment.id;
    let auction_id = payment.auction_id;
    payment
        .mark_completed(now)
        .map_err(|e| Rejection::Internal(e.to_string()))?;

    if let Some(auction) = store.auctions.get_mut(&auction_id) {
        auction.mark_paid(now);
    }

    Ok(CompleteOutcome::Confirmed(payment_id))
}
