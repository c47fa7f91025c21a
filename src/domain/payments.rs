// src/domain/payments.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use super::core::UserId;
use crate::money::Money;

/// Which payment channel an auction's listing fee moves through. Chosen at
/// auction creation; the channels are mutually exclusive per auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Gateway,
    Manual,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Gateway => write!(f, "gateway"),
            Channel::Manual => write!(f, "manual"),
        }
    }
}

/// What the ledger needs to know about a payment, independent of channel.
/// Both state machines implement this; the auction side effect itself lives
/// in `Auction::mark_paid` and is applied by each channel exactly once.
pub trait Settlement {
    fn payer(&self) -> &UserId;
    fn amount(&self) -> Money;
    fn is_settled(&self) -> bool;
}
