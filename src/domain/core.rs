// src/domain/core.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::money::Money;

pub type UserId = String;
pub type AuctionId = i64;
pub type ListingId = i64;
pub type BidId = i64;
pub type PaymentId = i64;

/// Authenticated caller. Members organize auctions, bid and pay;
/// reviewers confirm or reject manual payments and may cancel auctions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum User {
    Member { user_id: UserId, name: String },
    Reviewer { user_id: UserId },
}

impl User {
    pub fn user_id(&self) -> &UserId {
        match self {
            User::Member { user_id, .. } => user_id,
            User::Reviewer { user_id } => user_id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            User::Member { name, .. } => name,
            User::Reviewer { user_id } => user_id,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            User::Member { user_id, name } => write!(f, "Member|{}|{}", user_id, name),
            User::Reviewer { user_id } => write!(f, "Reviewer|{}", user_id),
        }
    }
}

impl Serialize for User {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for User {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let parts: Vec<&str> = text.split('|').collect();

        match parts.as_slice() {
            ["Member", user_id, name] => Ok(User::Member {
                user_id: user_id.to_string(),
                name: name.to_string(),
            }),
            ["Reviewer", user_id] => Ok(User::Reviewer {
                user_id: user_id.to_string(),
            }),
            _ => Err(serde::de::Error::custom(format!(
                "parsing User failed, could not interpret values: {:?}",
                parts
            ))),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Errors {
    #[error("Unknown auction: {0}")]
    UnknownAuction(AuctionId),

    #[error("Unknown listing: {0}")]
    UnknownListing(ListingId),

    #[error("Listing is already on auction: {0}")]
    ListingAlreadyOnAuction(ListingId),

    #[error("Unknown payment: {0}")]
    UnknownPayment(PaymentId),

    #[error("Time-bounded auctions require an end time")]
    MissingEndTime,

    #[error("Price-bounded auctions require a target price")]
    MissingTargetPrice,

    #[error("End time must be after start time")]
    EndTimeNotAfterStart,

    #[error("Target price must be above the start price")]
    TargetPriceNotAboveStart,

    #[error("Auction is not paid for: {0}")]
    NotPayable(AuctionId),

    #[error("Auction {auction_id} does not accept bids while {status}")]
    InvalidState {
        auction_id: AuctionId,
        status: String,
    },

    #[error("Auction is not active: {0}")]
    NotActive(AuctionId),

    #[error("Organizer cannot bid on their own auction: {0}")]
    OrganizerCannotBid(AuctionId),

    #[error("Bid must exceed the current price {current_price}")]
    BidTooLow { current_price: Money },

    #[error("Illegal status transition {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Payment is already settled: {0}")]
    PaymentAlreadySettled(PaymentId),

    #[error("Payment evidence is already awaiting review: {0}")]
    EvidenceAlreadyPending(PaymentId),

    #[error("Payment {payment_id} is not awaiting review (status {status})")]
    PaymentNotAwaitingReview {
        payment_id: PaymentId,
        status: String,
    },

    #[error("Only the listing owner may open an auction for it: {0}")]
    NotListingOwner(ListingId),

    #[error("Payment belongs to another user: {0}")]
    NotPaymentOwner(PaymentId),
}
