// src/domain/mod.rs
pub mod auctions;
pub mod bids;
pub mod core;
pub mod payments;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use self::auctions::*;
pub use self::bids::*;
pub use self::core::*;
pub use self::payments::*;

use crate::directory::ListingDirectory;
use crate::gateway::GatewayPayment;
use crate::manual::ManualPayment;
use crate::money::Money;

/// The single authoritative store. All writers (bid placement, payment
/// callbacks, scheduler sweeps) serialize on one lock around this value,
/// which is what keeps compare-then-write sequences on `current_price` and
/// payment statuses atomic.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Store {
    pub auctions: HashMap<AuctionId, Auction>,
    pub gateway_payments: HashMap<PaymentId, GatewayPayment>,
    pub manual_payments: HashMap<PaymentId, ManualPayment>,
    next_auction_id: i64,
    next_bid_id: i64,
    next_payment_id: i64,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn auction(&self, id: AuctionId) -> Result<&Auction, Errors> {
        self.auctions.get(&id).ok_or(Errors::UnknownAuction(id))
    }

    pub fn auction_mut(&mut self, id: AuctionId) -> Result<&mut Auction, Errors> {
        self.auctions.get_mut(&id).ok_or(Errors::UnknownAuction(id))
    }

    pub fn auction_by_listing(&self, listing_id: ListingId) -> Option<&Auction> {
        self.auctions.values().find(|a| a.listing_id == listing_id)
    }

    pub fn auctions(&self) -> Vec<&Auction> {
        let mut all: Vec<&Auction> = self.auctions.values().collect();
        all.sort_by_key(|a| a.id);
        all
    }

    pub fn gateway_payment_by_merchant_mut(
        &mut self,
        merchant_trans_id: &str,
    ) -> Option<&mut GatewayPayment> {
        self.gateway_payments
            .values_mut()
            .find(|p| p.merchant_trans_id == merchant_trans_id)
    }

    pub fn gateway_payment_for_auction(&self, auction_id: AuctionId) -> Option<&GatewayPayment> {
        self.gateway_payments
            .values()
            .find(|p| p.auction_id == auction_id)
    }

    pub fn manual_payment_for_auction(&self, auction_id: AuctionId) -> Option<&ManualPayment> {
        self.manual_payments
            .values()
            .find(|p| p.auction_id == auction_id)
    }

    /// Channel-independent view of an auction's payment, if any.
    pub fn settlement_for_auction(
        &self,
        auction_id: AuctionId,
    ) -> Option<(Channel, &dyn Settlement)> {
        if let Some(payment) = self.gateway_payment_for_auction(auction_id) {
            return Some((Channel::Gateway, payment));
        }
        if let Some(payment) = self.manual_payment_for_auction(auction_id) {
            return Some((Channel::Manual, payment));
        }
        None
    }
}

/// Opens an auction for a listing the organizer owns, creating the auction
/// together with its payment record for the requested channel in one step.
/// A listing can be on auction at most once, and an auction carries exactly
/// one payment for its whole life.
pub fn create_auction(
    store: &mut Store,
    directory: &dyn ListingDirectory,
    spec: AuctionSpec,
    channel: Channel,
    fee: Money,
    now: DateTime<Utc>,
) -> Result<AuctionId, Errors> {
    let listing = directory
        .get(spec.listing_id)
        .ok_or(Errors::UnknownListing(spec.listing_id))?;
    if listing.owner != spec.organizer {
        return Err(Errors::NotListingOwner(spec.listing_id));
    }
    if store.auction_by_listing(spec.listing_id).is_some() {
        return Err(Errors::ListingAlreadyOnAuction(spec.listing_id));
    }

    store.next_auction_id += 1;
    let auction_id = store.next_auction_id;
    let organizer = spec.organizer.clone();
    let auction = Auction::create(auction_id, spec, fee, now)?;

    store.next_payment_id += 1;
    let payment_id = store.next_payment_id;
    match channel {
        Channel::Gateway => {
            let payment = GatewayPayment::new(payment_id, auction_id, organizer, fee, now);
            store.gateway_payments.insert(payment_id, payment);
        }
        Channel::Manual => {
            let payment = ManualPayment::new(payment_id, auction_id, organizer, fee, now);
            store.manual_payments.insert(payment_id, payment);
        }
    }
    store.auctions.insert(auction_id, auction);

    Ok(auction_id)
}

/// Validate -> apply -> evaluate termination -> finalize, as one sequenced
/// pipeline under the store lock. Exactly one bid row is appended and at
/// most one auction update happens per accepted bid.
pub fn place_bid(
    store: &mut Store,
    auction_id: AuctionId,
    bidder: &UserId,
    amount: Money,
    now: DateTime<Utc>,
) -> Result<Bid, Errors> {
    {
        let auction = store.auction(auction_id)?;

        if !auction.is_paid {
            return Err(Errors::NotPayable(auction_id));
        }
        if !matches!(
            auction.status,
            AuctionStatus::Scheduled | AuctionStatus::Active
        ) {
            return Err(Errors::InvalidState {
                auction_id,
                status: auction.status.to_string(),
            });
        }
        if !auction.is_active(now) {
            return Err(Errors::NotActive(auction_id));
        }
        if *bidder == auction.organizer {
            return Err(Errors::OrganizerCannotBid(auction_id));
        }
        if amount <= auction.current_price {
            return Err(Errors::BidTooLow {
                current_price: auction.current_price,
            });
        }
    }

    store.next_bid_id += 1;
    let bid_id = store.next_bid_id;
    let auction = store.auction_mut(auction_id)?;

    // Server-assigned acceptance time, kept non-decreasing per auction.
    let at = auction
        .bids
        .last()
        .map(|last| last.at.max(now))
        .unwrap_or(now);
    let bid = Bid {
        id: bid_id,
        auction_id,
        bidder: bidder.clone(),
        amount,
        at,
    };
    auction.bids.push(bid.clone());
    auction.current_price = amount;
    auction.updated_at = now;

    if auction.should_end(now) {
        auction.determine_winner(now)?;
    }

    Ok(bid)
}

/// Administrative cancellation, legal from `pending_payment` and
/// `scheduled` only. Also closes the auction's still-open gateway payment
/// so late callbacks are refused.
pub fn cancel_auction(
    store: &mut Store,
    auction_id: AuctionId,
    now: DateTime<Utc>,
) -> Result<(), Errors> {
    let auction = store.auction_mut(auction_id)?;
    auction.transition(AuctionStatus::Cancelled, now)?;

    if let Some(payment) = store
        .gateway_payments
        .values_mut()
        .find(|p| p.auction_id == auction_id)
    {
        payment.cancel(now);
    }
    Ok(())
}
