mod utils;

use std::str::FromStr;

use estate_auctions::domain::{AuctionStatus, Channel, Store};
use estate_auctions::gateway::{self, PrepareRequest};
use estate_auctions::manual::ManualStatus;
use estate_auctions::money::Money;
use serde_json::{json, Value};
use utils::*;

// The gateway response field set is an external contract; serialize one
// and check it field by field.
#[test]
fn test_prepare_response_wire_shape() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, timed_spec(1), Channel::Gateway);
    let payment = store.gateway_payment_for_auction(auction_id).unwrap();
    let merchant_trans_id = payment.merchant_trans_id.clone();
    let payment_id = payment.id;

    let cfg = gateway_cfg();
    let request = prepare_request(&cfg, &merchant_trans_id, fee());
    let response = gateway::prepare(&mut store, &cfg, &request, t0());

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["gateway_transaction_id"], json!("GW-778141"));
    assert_eq!(value["merchant_transaction_id"], json!(merchant_trans_id));
    assert_eq!(value["merchant_prepare_id"], json!(payment_id));
    assert_eq!(value["error"], json!(0));
    assert_eq!(value["error_note"], json!("Success"));
    // The confirm id only appears in phase 2 responses.
    assert!(value.get("merchant_confirm_id").is_none());
}

#[test]
fn test_rejection_wire_shape() {
    let mut store = Store::new();
    let cfg = gateway_cfg();
    let request = prepare_request(&cfg, "AUCTION_MISSING000000000", fee());
    let response = gateway::prepare(&mut store, &cfg, &request, t0());

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["error"], json!(-5));
    assert_eq!(value["error_note"], json!("Transaction does not exist"));
    assert!(value.get("merchant_prepare_id").is_none());
}

// The gateway may post the amount as a string or a number.
#[test]
fn test_prepare_request_accepts_both_amount_encodings() {
    let as_string: PrepareRequest = serde_json::from_value(json!({
        "gateway_transaction_id": "GW-1",
        "service_id": "12345",
        "gateway_document_id": "DOC-1",
        "merchant_transaction_id": "AUCTION_ABC",
        "amount": "50000.00",
        "action": 0,
        "sign_time": "2024-01-01 08:00:00",
        "sign_string": "unchecked",
    }))
    .unwrap();
    assert_eq!(as_string.amount, Money::from_major(50000));

    let as_number: PrepareRequest = serde_json::from_value(json!({
        "gateway_transaction_id": "GW-1",
        "service_id": "12345",
        "gateway_document_id": "DOC-1",
        "merchant_transaction_id": "AUCTION_ABC",
        "amount": 50000,
        "action": 0,
        "sign_time": "2024-01-01 08:00:00",
        "sign_string": "unchecked",
    }))
    .unwrap();
    assert_eq!(as_number.amount, Money::from_major(50000));
}

#[test]
fn test_money_round_trip() {
    let amount = Money::from_str("50000").unwrap();
    assert_eq!(amount.to_string(), "50000.00");
    assert_eq!(amount, Money::from_major(50000));

    let serialized = serde_json::to_value(amount).unwrap();
    assert_eq!(serialized, json!("50000.00"));

    let parsed: Money = serde_json::from_value(serialized).unwrap();
    assert_eq!(parsed, amount);

    // Scale does not affect equality.
    assert_eq!(Money::from_str("1500000.0").unwrap(), Money::from_major(1_500_000));
    assert!(Money::from_str("0.01").unwrap() > Money::zero());
}

#[test]
fn test_status_names_on_the_wire() {
    assert_eq!(
        serde_json::to_value(AuctionStatus::PendingPayment).unwrap(),
        json!("pending_payment")
    );
    assert_eq!(
        serde_json::to_value(ManualStatus::WaitingConfirmation).unwrap(),
        json!("waiting_confirmation")
    );
    assert_eq!(
        serde_json::to_value(Channel::Gateway).unwrap(),
        json!("gateway")
    );
}

// A store snapshot survives a serialization round trip unchanged.
#[test]
fn test_store_snapshot_round_trip() {
    let mut store = Store::new();
    let auction_id = create_auction(&mut store, price_spec(1), Channel::Manual);
    pay_and_activate(&mut store, auction_id, t0());
    estate_auctions::domain::place_bid(
        &mut store,
        auction_id,
        &bidder_1(),
        money(1_100_000),
        t0(),
    )
    .unwrap();

    let json = serde_json::to_string(&store).unwrap();
    let restored: Store = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.auctions, store.auctions);
    assert_eq!(restored.manual_payments, store.manual_payments);

    let value: Value = serde_json::from_str(&json).unwrap();
    assert!(value.get("auctions").is_some());
}
