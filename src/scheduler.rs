// src/scheduler.rs
//
// Periodic sweep over the auction partitions. Each sweep is idempotent and
// touches a disjoint status partition, so their relative order does not
// matter and re-running one is always safe.
use chrono::{DateTime, Duration, Utc};
use log::{error, info};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::config::UNPAID_AUCTION_TTL_HOURS;
use crate::domain::{cancel_auction, AuctionId, AuctionStatus, Store};
use crate::persistence::json_file;

/// Scheduled, paid auctions whose start time has arrived go active.
pub fn activate_due(store: &mut Store, now: DateTime<Utc>) -> usize {
    let due: Vec<AuctionId> = store
        .auctions
        .values()
        .filter(|a| a.status == AuctionStatus::Scheduled && a.is_paid && a.start_time <= now)
        .map(|a| a.id)
        .collect();

    for id in &due {
        if let Some(auction) = store.auctions.get_mut(id) {
            if let Err(e) = auction.transition(AuctionStatus::Active, now) {
                error!("Failed to activate auction {}: {}", id, e);
            }
        }
    }
    due.len()
}

/// Active auctions whose end condition holds get finalized.
pub fn end_due(store: &mut Store, now: DateTime<Utc>) -> usize {
    let mut ended = 0;
    for auction in store.auctions.values_mut() {
        if auction.should_end(now) {
            match auction.determine_winner(now) {
                Ok(()) => ended += 1,
                Err(e) => error!("Failed to finalize auction {}: {}", auction.id, e),
            }
        }
    }
    ended
}

/// Unpaid auctions older than the TTL are cancelled, along with their open
/// gateway payment.
pub fn expire_unpaid(store: &mut Store, now: DateTime<Utc>) -> usize {
    let cutoff = now - Duration::hours(UNPAID_AUCTION_TTL_HOURS);
    let expired: Vec<AuctionId> = store
        .auctions
        .values()
        .filter(|a| {
            a.status == AuctionStatus::PendingPayment && !a.is_paid && a.created_at <= cutoff
        })
        .map(|a| a.id)
        .collect();

    for id in &expired {
        if let Err(e) = cancel_auction(store, *id, now) {
            error!("Failed to expire auction {}: {}", id, e);
        }
    }
    expired.len()
}

pub fn sweep(store: &mut Store, now: DateTime<Utc>) -> (usize, usize, usize) {
    (
        activate_due(store, now),
        end_due(store, now),
        expire_unpaid(store, now),
    )
}

/// Runs the sweeps forever at the configured interval. Spawned next to the
/// HTTP server; shares the single store lock with the request handlers.
pub async fn run(
    store: Arc<Mutex<Store>>,
    clock: Arc<dyn Clock>,
    interval_secs: u64,
    data_file: Option<PathBuf>,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        let now = clock.now();

        let (activated, ended, expired) = match store.lock() {
            Ok(mut guard) => {
                let counts = sweep(&mut guard, now);
                if counts != (0, 0, 0) {
                    if let Some(path) = &data_file {
                        if let Err(e) = json_file::write_store(path, &guard) {
                            error!("Failed to persist store after sweep: {}", e);
                        }
                    }
                }
                counts
            }
            Err(e) => {
                error!("Store lock poisoned, skipping sweep: {}", e);
                continue;
            }
        };

        if (activated, ended, expired) != (0, 0, 0) {
            info!(
                "Sweep: activated {}, ended {}, expired {}",
                activated, ended, expired
            );
        }
    }
}
