use chrono::{DateTime, Duration, TimeZone, Utc};

use estate_auctions::directory::{ListingInfo, StaticDirectory};
use estate_auctions::domain::{self, AuctionId, AuctionSpec, Channel, EndCondition, Store, UserId};
use estate_auctions::gateway::{signature, CompleteRequest, GatewayConfig, PrepareRequest};
use estate_auctions::money::Money;
use estate_auctions::scheduler;
// See https://users.rust-lang.org/t/sharing-code-and-macros-in-tests-directory/3098/7

// Sample data for tests
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

pub fn organizer() -> UserId {
    "Organizer_1".to_string()
}

pub fn bidder_1() -> UserId {
    "Bidder_1".to_string()
}

pub fn bidder_2() -> UserId {
    "Bidder_2".to_string()
}

pub fn money(value: i64) -> Money {
    Money::from_major(value)
}

pub fn fee() -> Money {
    money(50000)
}

pub fn directory() -> StaticDirectory {
    StaticDirectory::new(vec![
        ListingInfo {
            id: 1,
            owner: organizer(),
            title: "Two-room flat downtown".to_string(),
        },
        ListingInfo {
            id: 2,
            owner: organizer(),
            title: "House with a garden".to_string(),
        },
        ListingInfo {
            id: 3,
            owner: "Someone_Else".to_string(),
            title: "Studio near the station".to_string(),
        },
    ])
}

pub fn timed_spec(listing_id: i64) -> AuctionSpec {
    AuctionSpec {
        listing_id,
        organizer: organizer(),
        start_price: money(1_000_000),
        start_time: t0(),
        end_condition: EndCondition::ByTime {
            end_time: t0() + Duration::days(7),
        },
    }
}

pub fn price_spec(listing_id: i64) -> AuctionSpec {
    AuctionSpec {
        listing_id,
        organizer: organizer(),
        start_price: money(1_000_000),
        start_time: t0(),
        end_condition: EndCondition::ByPrice {
            target_price: money(1_500_000),
        },
    }
}

pub fn create_auction(store: &mut Store, spec: AuctionSpec, channel: Channel) -> AuctionId {
    domain::create_auction(store, &directory(), spec, channel, fee(), t0()).unwrap()
}

/// Settles the fee out of band and runs the activation sweep.
pub fn pay_and_activate(store: &mut Store, auction_id: AuctionId, now: DateTime<Utc>) {
    store.auctions.get_mut(&auction_id).unwrap().mark_paid(now);
    scheduler::activate_due(store, now);
}

pub fn gateway_cfg() -> GatewayConfig {
    GatewayConfig {
        service_id: "12345".to_string(),
        secret_key: "s3cr3t".to_string(),
    }
}

pub fn prepare_request(
    cfg: &GatewayConfig,
    merchant_transaction_id: &str,
    amount: Money,
) -> PrepareRequest {
    let gateway_transaction_id = "GW-778141".to_string();
    PrepareRequest {
        sign_string: signature(cfg, &gateway_transaction_id, merchant_transaction_id),
        gateway_transaction_id,
        service_id: cfg.service_id.clone(),
        gateway_document_id: "DOC-1".to_string(),
        merchant_transaction_id: merchant_transaction_id.to_string(),
        amount,
        action: 0,
        sign_time: "2024-01-01 08:00:00".to_string(),
    }
}

pub fn complete_request(
    cfg: &GatewayConfig,
    merchant_transaction_id: &str,
    merchant_prepare_id: i64,
    amount: Money,
    error: i32,
) -> CompleteRequest {
    let gateway_transaction_id = "GW-778141".to_string();
    CompleteRequest {
        sign_string: signature(cfg, &gateway_transaction_id, merchant_transaction_id),
        gateway_transaction_id,
        service_id: cfg.service_id.clone(),
        gateway_document_id: "DOC-1".to_string(),
        merchant_transaction_id: merchant_transaction_id.to_string(),
        merchant_prepare_id,
        amount,
        action: 1,
        sign_time: "2024-01-01 08:05:00".to_string(),
        error,
    }
}
