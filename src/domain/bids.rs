// src/domain/bids.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::core::{AuctionId, BidId, UserId};
use crate::money::Money;

/// An accepted offer. Immutable once created; `at` is server-assigned and
/// non-decreasing within an auction, so bid ids double as acceptance order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub bidder: UserId,
    pub amount: Money,
    pub at: DateTime<Utc>,
}
