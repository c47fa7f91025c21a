// src/notifier.rs
//
// Best-effort reviewer notifications. Failures here are logged and
// swallowed: the payment state machines never depend on the reviewer
// channel being reachable.
use async_trait::async_trait;
use log::warn;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{TelegramConfig, NOTIFIER_TIMEOUT_SECS};
use crate::domain::core::{AuctionId, PaymentId};
use crate::money::Money;

pub type MessageHandle = i64;

/// Everything the reviewer sees about a submitted payment.
#[derive(Debug, Clone)]
pub struct PaymentNotice {
    pub payment_id: PaymentId,
    pub auction_id: AuctionId,
    pub listing_title: String,
    pub amount: Money,
    pub payer_name: String,
    pub evidence_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum ReviewOutcome {
    Confirmed,
    Rejected { reason: String },
}

#[async_trait]
pub trait ReviewNotifier: Send + Sync {
    /// Posts the evidence with confirm/reject controls. Returns a handle
    /// for later edits, or `None` when delivery failed.
    async fn payment_submitted(&self, notice: &PaymentNotice) -> Option<MessageHandle>;

    /// Replaces the controls on the original message with the outcome.
    async fn payment_resolved(
        &self,
        handle: MessageHandle,
        notice: &PaymentNotice,
        outcome: &ReviewOutcome,
    );
}

/// Used when no reviewer channel is configured, and in tests.
#[derive(Debug, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl ReviewNotifier for DisabledNotifier {
    async fn payment_submitted(&self, _notice: &PaymentNotice) -> Option<MessageHandle> {
        None
    }

    async fn payment_resolved(
        &self,
        _handle: MessageHandle,
        _notice: &PaymentNotice,
        _outcome: &ReviewOutcome,
    ) {
    }
}

/// Telegram bot channel: evidence photo to the admin chat with inline
/// confirm/reject buttons, edited in place once decided.
pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(cfg: &TelegramConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(NOTIFIER_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        TelegramNotifier {
            http,
            base_url: format!("https://api.telegram.org/bot{}", cfg.bot_token),
            chat_id: cfg.admin_chat_id.clone(),
        }
    }

    fn caption(notice: &PaymentNotice) -> String {
        format!(
            "New auction payment submitted\n\n\
             Auction: #{}\n\
             Listing: {}\n\
             Amount: {}\n\
             Payer: {}\n\
             Payment id: {}",
            notice.auction_id,
            notice.listing_title,
            notice.amount,
            notice.payer_name,
            notice.payment_id,
        )
    }

    fn keyboard(payment_id: PaymentId) -> String {
        json!({
            "inline_keyboard": [[
                { "text": "Confirm", "callback_data": format!("confirm_{}", payment_id) },
                { "text": "Reject", "callback_data": format!("reject_{}", payment_id) },
            ]]
        })
        .to_string()
    }

    fn message_id(value: &serde_json::Value) -> Option<MessageHandle> {
        value
            .get("result")
            .and_then(|r| r.get("message_id"))
            .and_then(|id| id.as_i64())
    }
}

#[async_trait]
impl ReviewNotifier for TelegramNotifier {
    async fn payment_submitted(&self, notice: &PaymentNotice) -> Option<MessageHandle> {
        let caption = Self::caption(notice);
        let keyboard = Self::keyboard(notice.payment_id);

        let request = match &notice.evidence_path {
            Some(path) => {
                let photo = match tokio::fs::read(path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("Failed to read evidence {}: {}", path.display(), e);
                        return None;
                    }
                };
                let form = reqwest::multipart::Form::new()
                    .text("chat_id", self.chat_id.clone())
                    .text("caption", caption)
                    .text("reply_markup", keyboard)
                    .part(
                        "photo",
                        reqwest::multipart::Part::bytes(photo).file_name("evidence"),
                    );
                self.http
                    .post(format!("{}/sendPhoto", self.base_url))
                    .multipart(form)
            }
            None => self
                .http
                .post(format!("{}/sendMessage", self.base_url))
                .json(&json!({
                    "chat_id": self.chat_id,
                    "text": caption,
                    "reply_markup": keyboard,
                })),
        };

        match request.send().await {
            Ok(response) => match response.json::<serde_json::Value>().await {
                Ok(value) => Self::message_id(&value),
                Err(e) => {
                    warn!("Notifier response unreadable: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Notifier delivery failed: {}", e);
                None
            }
        }
    }

    async fn payment_resolved(
        &self,
        handle: MessageHandle,
        notice: &PaymentNotice,
        outcome: &ReviewOutcome,
    ) {
        let mut caption = match outcome {
            ReviewOutcome::Confirmed => format!("Payment CONFIRMED\n\n{}", Self::caption(notice)),
            ReviewOutcome::Rejected { .. } => {
                format!("Payment REJECTED\n\n{}", Self::caption(notice))
            }
        };
        if let ReviewOutcome::Rejected { reason } = outcome {
            caption.push_str(&format!("\n\nReason: {}", reason));
        }

        let result = self
            .http
            .post(format!("{}/editMessageCaption", self.base_url))
            .json(&json!({
                "chat_id": self.chat_id,
                "message_id": handle,
                "caption": caption,
            }))
            .send()
            .await;

        if let Err(e) = result {
            warn!("Notifier edit failed: {}", e);
        }
    }
}
