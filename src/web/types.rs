// src/web/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::directory::ListingDirectory;
use crate::domain::{
    Auction, AuctionId, AuctionStatus, Bid, BidId, Channel, EndCondition, Errors, ListingId,
    PaymentId, Store, UserId,
};
use crate::manual::Decision;
use crate::money::Money;
use crate::notifier::ReviewNotifier;

/// Shared application context handed to every handler and the scheduler.
pub struct AppCtx {
    pub store: Arc<Mutex<Store>>,
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub directory: Arc<dyn ListingDirectory>,
    pub notifier: Arc<dyn ReviewNotifier>,
}

pub type AppState = actix_web::web::Data<AppCtx>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndKind {
    ByTime,
    ByPrice,
    ByTimeOrPrice,
}

#[derive(Debug, Deserialize)]
pub struct CreateAuctionRequest {
    pub listing_id: ListingId,
    pub start_price: Money,
    pub end_type: EndKind,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub target_price: Option<Money>,
    pub payment_channel: Channel,
}

impl CreateAuctionRequest {
    /// Builds the end condition, refusing requests that omit the bounds
    /// their kind requires.
    pub fn end_condition(&self) -> Result<EndCondition, Errors> {
        match self.end_type {
            EndKind::ByTime => {
                let end_time = self.end_time.ok_or(Errors::MissingEndTime)?;
                Ok(EndCondition::ByTime { end_time })
            }
            EndKind::ByPrice => {
                let target_price = self.target_price.ok_or(Errors::MissingTargetPrice)?;
                Ok(EndCondition::ByPrice { target_price })
            }
            EndKind::ByTimeOrPrice => {
                let end_time = self.end_time.ok_or(Errors::MissingEndTime)?;
                let target_price = self.target_price.ok_or(Errors::MissingTargetPrice)?;
                Ok(EndCondition::ByTimeOrPrice {
                    end_time,
                    target_price,
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BidRequest {
    pub amount: Money,
}

#[derive(Debug, Serialize)]
pub struct AuctionItem {
    pub id: AuctionId,
    pub listing_id: ListingId,
    pub status: AuctionStatus,
    pub start_price: Money,
    pub current_price: Money,
    pub start_time: DateTime<Utc>,
    pub is_paid: bool,
}

impl From<&Auction> for AuctionItem {
    fn from(auction: &Auction) -> Self {
        AuctionItem {
            id: auction.id,
            listing_id: auction.listing_id,
            status: auction.status,
            start_price: auction.start_price,
            current_price: auction.current_price,
            start_time: auction.start_time,
            is_paid: auction.is_paid,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BidView {
    pub id: BidId,
    pub bidder: UserId,
    pub amount: Money,
    pub at: DateTime<Utc>,
}

impl From<&Bid> for BidView {
    fn from(bid: &Bid) -> Self {
        BidView {
            id: bid.id,
            bidder: bid.bidder.clone(),
            amount: bid.amount,
            at: bid.at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuctionDetail {
    pub id: AuctionId,
    pub listing_id: ListingId,
    pub organizer: UserId,
    pub status: AuctionStatus,
    pub start_price: Money,
    pub current_price: Money,
    pub end_condition: EndCondition,
    pub start_time: DateTime<Utc>,
    pub is_paid: bool,
    pub payment_amount: Money,
    pub bids: Vec<BidView>,
    pub winner: Option<UserId>,
    pub winning_bid: Option<BidId>,
}

impl From<&Auction> for AuctionDetail {
    fn from(auction: &Auction) -> Self {
        AuctionDetail {
            id: auction.id,
            listing_id: auction.listing_id,
            organizer: auction.organizer.clone(),
            status: auction.status,
            start_price: auction.start_price,
            current_price: auction.current_price,
            end_condition: auction.end_condition,
            start_time: auction.start_time,
            is_paid: auction.is_paid,
            payment_amount: auction.payment_amount,
            bids: auction.bids.iter().map(BidView::from).collect(),
            winner: auction.winner.clone(),
            winning_bid: auction.winning_bid,
        }
    }
}

/// What the organizer needs to actually pay the listing fee.
#[derive(Debug, Serialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum PaymentInstructions {
    Gateway {
        payment_id: PaymentId,
        merchant_transaction_id: String,
        amount: Money,
    },
    Manual {
        payment_id: PaymentId,
        amount: Money,
        card_number: String,
        instructions: String,
    },
}

pub fn manual_instructions(card_number: &str) -> String {
    format!(
        "1. Transfer the exact amount to card {}\n\
         2. Take a screenshot of the receipt\n\
         3. Upload the screenshot\n\
         4. Wait for confirmation (usually 5-15 minutes)",
        card_number
    )
}

#[derive(Debug, Serialize)]
pub struct CreatedAuction {
    pub id: AuctionId,
    pub status: AuctionStatus,
    pub payment: PaymentInstructions,
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub payment_id: PaymentId,
    pub channel: Channel,
    pub payer: UserId,
    pub status: String,
    pub amount: Money,
    pub settled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<PaymentInstructions>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub payment_id: PaymentId,
    pub decision: Decision,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub payment_id: PaymentId,
    pub status: String,
    pub result: &'static str,
}
