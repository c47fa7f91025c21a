mod utils;

use chrono::Duration;

use estate_auctions::domain::{
    self, AuctionStatus, Channel, EndCondition, Errors, Store,
};
use estate_auctions::web::types::{CreateAuctionRequest, EndKind};
use utils::*;

#[test]
fn test_create_auction_starts_pending_payment() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, timed_spec(1), Channel::Gateway);

    let auction = store.auction(auction_id).unwrap();
    assert_eq!(auction.status, AuctionStatus::PendingPayment);
    assert_eq!(auction.current_price, money(1_000_000));
    assert_eq!(auction.start_price, money(1_000_000));
    assert!(!auction.is_paid);
    assert_eq!(auction.payment_amount, fee());

    // The payment record is created atomically with the auction.
    let payment = store.gateway_payment_for_auction(auction_id).unwrap();
    assert_eq!(payment.amount, fee());
    assert!(payment.merchant_trans_id.starts_with("AUCTION_"));
}

#[test]
fn test_create_auction_rejects_inverted_bounds() {
    let mut store = Store::new();

    let mut spec = timed_spec(1);
    spec.end_condition = EndCondition::ByTime { end_time: t0() };
    let result = domain::create_auction(
        &mut store,
        &directory(),
        spec,
        Channel::Gateway,
        fee(),
        t0(),
    );
    assert_eq!(result, Err(Errors::EndTimeNotAfterStart));

    let mut spec = price_spec(1);
    spec.end_condition = EndCondition::ByPrice {
        target_price: money(1_000_000),
    };
    let result = domain::create_auction(
        &mut store,
        &directory(),
        spec,
        Channel::Gateway,
        fee(),
        t0(),
    );
    assert_eq!(result, Err(Errors::TargetPriceNotAboveStart));

    // Nothing was persisted by the failed attempts.
    assert!(store.auctions.is_empty());
    assert!(store.gateway_payments.is_empty());
}

// Scenario: time-bounded auction requested without an end time never
// reaches the ledger.
#[test]
fn test_create_auction_requires_end_time_for_timed_kind() {
    let request = CreateAuctionRequest {
        listing_id: 1,
        start_price: money(1_000_000),
        end_type: EndKind::ByTime,
        start_time: t0(),
        end_time: None,
        target_price: None,
        payment_channel: Channel::Gateway,
    };
    assert_eq!(request.end_condition(), Err(Errors::MissingEndTime));

    let request = CreateAuctionRequest {
        listing_id: 1,
        start_price: money(1_000_000),
        end_type: EndKind::ByTimeOrPrice,
        start_time: t0(),
        end_time: Some(t0() + Duration::days(7)),
        target_price: None,
        payment_channel: Channel::Gateway,
    };
    assert_eq!(request.end_condition(), Err(Errors::MissingTargetPrice));
}

#[test]
fn test_one_auction_per_listing() {
    let mut store = Store::new();
    create_auction(&mut store, timed_spec(1), Channel::Gateway);

    let result = domain::create_auction(
        &mut store,
        &directory(),
        timed_spec(1),
        Channel::Manual,
        fee(),
        t0(),
    );
    assert_eq!(result, Err(Errors::ListingAlreadyOnAuction(1)));
}

#[test]
fn test_create_auction_checks_listing_directory() {
    let mut store = Store::new();

    let result = domain::create_auction(
        &mut store,
        &directory(),
        timed_spec(99),
        Channel::Gateway,
        fee(),
        t0(),
    );
    assert_eq!(result, Err(Errors::UnknownListing(99)));

    // Listing 3 belongs to someone else.
    let result = domain::create_auction(
        &mut store,
        &directory(),
        timed_spec(3),
        Channel::Gateway,
        fee(),
        t0(),
    );
    assert_eq!(result, Err(Errors::NotListingOwner(3)));
}

#[test]
fn test_bid_requires_payment() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, timed_spec(1), Channel::Gateway);

    let result = domain::place_bid(&mut store, auction_id, &bidder_1(), money(1_100_000), t0());
    assert_eq!(result, Err(Errors::NotPayable(auction_id)));
}

#[test]
fn test_bid_requires_active_auction() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, timed_spec(1), Channel::Gateway);

    // Paid but still scheduled: the sweep has not activated it yet.
    store.auctions.get_mut(&auction_id).unwrap().mark_paid(t0());
    assert_eq!(
        store.auction(auction_id).unwrap().status,
        AuctionStatus::Scheduled
    );

    let result = domain::place_bid(&mut store, auction_id, &bidder_1(), money(1_100_000), t0());
    assert_eq!(result, Err(Errors::NotActive(auction_id)));
}

// Scenario: the organizer never bids on their own auction, whatever the
// amount.
#[test]
fn test_organizer_cannot_bid() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, timed_spec(1), Channel::Gateway);
    pay_and_activate(&mut store, auction_id, t0());

    let result = domain::place_bid(&mut store, auction_id, &organizer(), money(9_000_000), t0());
    assert_eq!(result, Err(Errors::OrganizerCannotBid(auction_id)));
}

#[test]
fn test_bids_must_strictly_increase() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, timed_spec(1), Channel::Gateway);
    pay_and_activate(&mut store, auction_id, t0());
    let now = t0() + Duration::minutes(1);

    domain::place_bid(&mut store, auction_id, &bidder_1(), money(1_100_000), now).unwrap();

    // Equal to the current price is too low.
    let result = domain::place_bid(&mut store, auction_id, &bidder_2(), money(1_100_000), now);
    assert_eq!(
        result,
        Err(Errors::BidTooLow {
            current_price: money(1_100_000)
        })
    );

    domain::place_bid(&mut store, auction_id, &bidder_2(), money(1_200_000), now).unwrap();

    let auction = store.auction(auction_id).unwrap();
    assert_eq!(auction.current_price, money(1_200_000));
    assert_eq!(auction.bids.len(), 2);

    // Accepted amounts are strictly increasing in acceptance order.
    for pair in auction.bids.windows(2) {
        assert!(pair[0].amount < pair[1].amount);
    }
    // And the current price always tracks the latest accepted bid.
    assert_eq!(auction.current_price, auction.bids.last().unwrap().amount);
}

// Scenario: price-bounded auction ends the moment a bid reaches the target.
#[test]
fn test_price_target_completes_auction() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, price_spec(1), Channel::Gateway);
    pay_and_activate(&mut store, auction_id, t0());
    let now = t0() + Duration::minutes(5);

    domain::place_bid(&mut store, auction_id, &bidder_1(), money(1_600_000), now).unwrap();

    let auction = store.auction(auction_id).unwrap();
    assert_eq!(auction.status, AuctionStatus::Completed);
    assert_eq!(auction.current_price, money(1_600_000));
    assert_eq!(auction.winner, Some(bidder_1()));
    assert_eq!(auction.winning_bid, Some(auction.bids[0].id));
}

#[test]
fn test_no_bids_after_completion() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, price_spec(1), Channel::Gateway);
    pay_and_activate(&mut store, auction_id, t0());
    let now = t0() + Duration::minutes(5);

    domain::place_bid(&mut store, auction_id, &bidder_1(), money(1_600_000), now).unwrap();

    let result = domain::place_bid(&mut store, auction_id, &bidder_2(), money(1_700_000), now);
    assert_eq!(
        result,
        Err(Errors::InvalidState {
            auction_id,
            status: "completed".to_string()
        })
    );
}

#[test]
fn test_determine_winner_is_idempotent() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, price_spec(1), Channel::Gateway);
    pay_and_activate(&mut store, auction_id, t0());
    let now = t0() + Duration::minutes(5);

    domain::place_bid(&mut store, auction_id, &bidder_1(), money(1_600_000), now).unwrap();

    let first = store.auction(auction_id).unwrap().clone();
    store
        .auctions
        .get_mut(&auction_id)
        .unwrap()
        .determine_winner(now + Duration::minutes(1))
        .unwrap();
    let second = store.auction(auction_id).unwrap();

    assert_eq!(&first, second);
}

#[test]
fn test_timed_auction_completes_without_winner_when_no_bids() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, timed_spec(1), Channel::Gateway);
    pay_and_activate(&mut store, auction_id, t0());

    let after_end = t0() + Duration::days(7) + Duration::seconds(1);
    store
        .auctions
        .get_mut(&auction_id)
        .unwrap()
        .determine_winner(after_end)
        .unwrap();

    let auction = store.auction(auction_id).unwrap();
    assert_eq!(auction.status, AuctionStatus::Completed);
    assert_eq!(auction.winner, None);
    assert_eq!(auction.winning_bid, None);
    assert_eq!(auction.current_price, auction.start_price);
}

#[test]
fn test_highest_bid_wins_on_time_expiry() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, timed_spec(1), Channel::Gateway);
    pay_and_activate(&mut store, auction_id, t0());
    let now = t0() + Duration::hours(1);

    domain::place_bid(&mut store, auction_id, &bidder_1(), money(1_100_000), now).unwrap();
    domain::place_bid(&mut store, auction_id, &bidder_2(), money(1_250_000), now).unwrap();

    let after_end = t0() + Duration::days(7) + Duration::seconds(1);
    store
        .auctions
        .get_mut(&auction_id)
        .unwrap()
        .determine_winner(after_end)
        .unwrap();

    let auction = store.auction(auction_id).unwrap();
    assert_eq!(auction.status, AuctionStatus::Completed);
    assert_eq!(auction.winner, Some(bidder_2()));
    assert_eq!(auction.current_price, money(1_250_000));
}

#[test]
fn test_cancel_auction_transitions() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, timed_spec(1), Channel::Gateway);

    domain::cancel_auction(&mut store, auction_id, t0()).unwrap();
    let auction = store.auction(auction_id).unwrap();
    assert_eq!(auction.status, AuctionStatus::Cancelled);

    // The open gateway payment is closed along with the auction.
    let payment = store.gateway_payment_for_auction(auction_id).unwrap();
    assert_eq!(
        payment.status,
        estate_auctions::gateway::GatewayStatus::Cancelled
    );
}

#[test]
fn test_cancel_rejected_for_active_auction() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, timed_spec(1), Channel::Gateway);
    pay_and_activate(&mut store, auction_id, t0());

    let result = domain::cancel_auction(&mut store, auction_id, t0());
    assert_eq!(
        result,
        Err(Errors::IllegalTransition {
            from: "active".to_string(),
            to: "cancelled".to_string()
        })
    );
}
