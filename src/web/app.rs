// src/web/app.rs
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Result};
use base64::{engine::general_purpose, Engine as _};
use log::{error, info, warn};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::directory::{ListingDirectory, StaticDirectory};
use crate::domain::{self, AuctionSpec, Channel, Errors, PaymentId, Store, User};
use crate::gateway::{self, CompleteRequest, GatewayResponse, PrepareRequest};
use crate::manual::{self, DecisionOutcome};
use crate::notifier::{
    DisabledNotifier, PaymentNotice, ReviewNotifier, ReviewOutcome, TelegramNotifier,
};
use crate::persistence::json_file;
use crate::scheduler;

use super::types::{
    manual_instructions, ApiError, AppCtx, AppState, AuctionDetail, AuctionItem, BidRequest,
    BidView, CreateAuctionRequest, CreatedAuction, DecisionRequest, DecisionResponse,
    PaymentInstructions, PaymentView,
};

// Read x-jwt-payload header and extract user information
fn get_auth_user(req: &HttpRequest) -> Option<User> {
    let auth_header = req.headers().get("x-jwt-payload")?;
    let auth_str = auth_header.to_str().ok()?;

    let decoded = general_purpose::STANDARD.decode(auth_str).ok()?;
    let json_str = String::from_utf8(decoded).ok()?;
    let json: Value = serde_json::from_str(&json_str).ok()?;

    let sub = json.get("sub")?.as_str()?;
    let u_typ = json.get("u_typ")?.as_str()?;

    if u_typ == "0" {
        let name = json.get("name")?.as_str()?;
        Some(User::Member {
            user_id: sub.to_string(),
            name: name.to_string(),
        })
    } else if u_typ == "1" {
        Some(User::Reviewer {
            user_id: sub.to_string(),
        })
    } else {
        None
    }
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(ApiError::new("Unauthorized"))
}

fn error_response(err: &Errors) -> HttpResponse {
    use Errors::*;
    let mut builder = match err {
        UnknownAuction(_) | UnknownListing(_) | UnknownPayment(_) => HttpResponse::NotFound(),
        OrganizerCannotBid(_) | NotListingOwner(_) | NotPaymentOwner(_) => {
            HttpResponse::Forbidden()
        }
        MissingEndTime | MissingTargetPrice | EndTimeNotAfterStart | TargetPriceNotAboveStart
        | BidTooLow { .. } => HttpResponse::BadRequest(),
        ListingAlreadyOnAuction(_) | NotPayable(_) | InvalidState { .. } | NotActive(_)
        | IllegalTransition { .. } | PaymentAlreadySettled(_) | EvidenceAlreadyPending(_)
        | PaymentNotAwaitingReview { .. } => HttpResponse::Conflict(),
    };
    builder.json(ApiError::new(err.to_string()))
}

fn store_guard(data: &AppCtx) -> std::result::Result<MutexGuard<'_, Store>, HttpResponse> {
    data.store
        .lock()
        .map_err(|_| HttpResponse::InternalServerError().json(ApiError::new("Internal error")))
}

/// Best-effort snapshot write; persistence failures never fail a request.
fn persist(data: &AppCtx, store: &Store) {
    if let Some(path) = &data.config.data_file {
        if let Err(e) = json_file::write_store(path, store) {
            error!("Failed to persist store: {}", e);
        }
    }
}

fn listing_title(data: &AppCtx, listing_id: i64) -> String {
    data.directory
        .get(listing_id)
        .map(|l| l.title)
        .unwrap_or_else(|| format!("Listing #{}", listing_id))
}

// Get all auctions
async fn get_auctions(data: AppState) -> Result<HttpResponse> {
    let store = match store_guard(&data) {
        Ok(store) => store,
        Err(resp) => return Ok(resp),
    };
    let auction_list: Vec<AuctionItem> = store.auctions().iter().map(|a| AuctionItem::from(*a)).collect();
    Ok(HttpResponse::Ok().json(auction_list))
}

// Get auction by ID
async fn get_auction(path: web::Path<i64>, data: AppState) -> Result<HttpResponse> {
    let auction_id = path.into_inner();
    let store = match store_guard(&data) {
        Ok(store) => store,
        Err(resp) => return Ok(resp),
    };
    match store.auction(auction_id) {
        Ok(auction) => Ok(HttpResponse::Ok().json(AuctionDetail::from(auction))),
        Err(e) => Ok(error_response(&e)),
    }
}

// Create a new auction together with its listing-fee payment
async fn create_auction(
    req: HttpRequest,
    auction_req: web::Json<CreateAuctionRequest>,
    data: AppState,
) -> Result<HttpResponse> {
    let user = match get_auth_user(&req) {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };

    let end_condition = match auction_req.end_condition() {
        Ok(end_condition) => end_condition,
        Err(e) => return Ok(error_response(&e)),
    };
    let spec = AuctionSpec {
        listing_id: auction_req.listing_id,
        organizer: user.user_id().clone(),
        start_price: auction_req.start_price,
        start_time: auction_req.start_time,
        end_condition,
    };

    let now = data.clock.now();
    let mut store = match store_guard(&data) {
        Ok(store) => store,
        Err(resp) => return Ok(resp),
    };

    let auction_id = match domain::create_auction(
        &mut store,
        data.directory.as_ref(),
        spec,
        auction_req.payment_channel,
        data.config.listing_fee,
        now,
    ) {
        Ok(auction_id) => auction_id,
        Err(e) => return Ok(error_response(&e)),
    };

    let payment = match auction_req.payment_channel {
        Channel::Gateway => {
            let p = store.gateway_payment_for_auction(auction_id);
            match p {
                Some(p) => PaymentInstructions::Gateway {
                    payment_id: p.id,
                    merchant_transaction_id: p.merchant_trans_id.clone(),
                    amount: p.amount,
                },
                None => return Ok(HttpResponse::InternalServerError()
                    .json(ApiError::new("Payment record missing"))),
            }
        }
        Channel::Manual => match store.manual_payment_for_auction(auction_id) {
            Some(p) => PaymentInstructions::Manual {
                payment_id: p.id,
                amount: p.amount,
                card_number: data.config.card_number.clone(),
                instructions: manual_instructions(&data.config.card_number),
            },
            None => {
                return Ok(HttpResponse::InternalServerError()
                    .json(ApiError::new("Payment record missing")))
            }
        },
    };

    let status = match store.auction(auction_id) {
        Ok(auction) => auction.status,
        Err(e) => return Ok(error_response(&e)),
    };
    persist(&data, &store);

    Ok(HttpResponse::Created().json(CreatedAuction {
        id: auction_id,
        status,
        payment,
    }))
}

// Place a bid on an auction
async fn place_bid(
    req: HttpRequest,
    path: web::Path<i64>,
    bid_req: web::Json<BidRequest>,
    data: AppState,
) -> Result<HttpResponse> {
    let auction_id = path.into_inner();
    let user = match get_auth_user(&req) {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };

    let now = data.clock.now();
    let mut store = match store_guard(&data) {
        Ok(store) => store,
        Err(resp) => return Ok(resp),
    };

    match domain::place_bid(&mut store, auction_id, user.user_id(), bid_req.amount, now) {
        Ok(bid) => {
            persist(&data, &store);
            Ok(HttpResponse::Created().json(BidView::from(&bid)))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

// Administrative cancellation of a not-yet-active auction
async fn cancel_auction(
    req: HttpRequest,
    path: web::Path<i64>,
    data: AppState,
) -> Result<HttpResponse> {
    let auction_id = path.into_inner();
    match get_auth_user(&req) {
        Some(User::Reviewer { .. }) => {}
        Some(_) => {
            return Ok(HttpResponse::Forbidden().json(ApiError::new("Reviewer access required")))
        }
        None => return Ok(unauthorized()),
    }

    let now = data.clock.now();
    let mut store = match store_guard(&data) {
        Ok(store) => store,
        Err(resp) => return Ok(resp),
    };

    match domain::cancel_auction(&mut store, auction_id, now) {
        Ok(()) => {
            persist(&data, &store);
            match store.auction(auction_id) {
                Ok(auction) => Ok(HttpResponse::Ok().json(AuctionItem::from(auction))),
                Err(e) => Ok(error_response(&e)),
            }
        }
        Err(e) => Ok(error_response(&e)),
    }
}

// Payment status for an auction, with instructions while unsettled
async fn get_auction_payment(path: web::Path<i64>, data: AppState) -> Result<HttpResponse> {
    let auction_id = path.into_inner();
    let store = match store_guard(&data) {
        Ok(store) => store,
        Err(resp) => return Ok(resp),
    };

    if store.auction(auction_id).is_err() {
        return Ok(error_response(&Errors::UnknownAuction(auction_id)));
    }

    let Some((channel, settlement)) = store.settlement_for_auction(auction_id) else {
        return Ok(HttpResponse::NotFound().json(ApiError::new("No payment for auction")));
    };
    let settled = settlement.is_settled();
    let amount = settlement.amount();
    let payer = settlement.payer().clone();

    let view = match channel {
        Channel::Gateway => {
            // Present: settlement_for_auction found it above.
            let Some(p) = store.gateway_payment_for_auction(auction_id) else {
                return Ok(
                    HttpResponse::InternalServerError().json(ApiError::new("Internal error"))
                );
            };
            PaymentView {
                payment_id: p.id,
                channel,
                payer,
                status: p.status.to_string(),
                amount,
                settled,
                instructions: if p.status.is_open() {
                    Some(PaymentInstructions::Gateway {
                        payment_id: p.id,
                        merchant_transaction_id: p.merchant_trans_id.clone(),
                        amount,
                    })
                } else {
                    None
                },
            }
        }
        Channel::Manual => {
            let Some(p) = store.manual_payment_for_auction(auction_id) else {
                return Ok(
                    HttpResponse::InternalServerError().json(ApiError::new("Internal error"))
                );
            };
            PaymentView {
                payment_id: p.id,
                channel,
                payer,
                status: p.status.to_string(),
                amount,
                settled,
                instructions: if settled {
                    None
                } else {
                    Some(PaymentInstructions::Manual {
                        payment_id: p.id,
                        amount,
                        card_number: data.config.card_number.clone(),
                        instructions: manual_instructions(&data.config.card_number),
                    })
                },
            }
        }
    };

    Ok(HttpResponse::Ok().json(view))
}

// Gateway callback, phase 1
async fn gateway_prepare(
    callback: web::Json<PrepareRequest>,
    data: AppState,
) -> Result<HttpResponse> {
    let callback = callback.into_inner();
    let now = data.clock.now();

    let response = match data.store.lock() {
        Ok(mut store) => {
            let response = gateway::prepare(&mut store, &data.config.gateway, &callback, now);
            if response.error == 0 {
                persist(&data, &store);
            }
            response
        }
        Err(_) => GatewayResponse::internal_fault(
            &callback.gateway_transaction_id,
            &callback.merchant_transaction_id,
            "store unavailable",
        ),
    };

    Ok(HttpResponse::Ok().json(response))
}

// Gateway callback, phase 2
async fn gateway_complete(
    callback: web::Json<CompleteRequest>,
    data: AppState,
) -> Result<HttpResponse> {
    let callback = callback.into_inner();
    let now = data.clock.now();

    let response = match data.store.lock() {
        Ok(mut store) => {
            let response = gateway::complete(&mut store, &data.config.gateway, &callback, now);
            persist(&data, &store);
            response
        }
        Err(_) => GatewayResponse::internal_fault(
            &callback.gateway_transaction_id,
            &callback.merchant_transaction_id,
            "store unavailable",
        ),
    };

    Ok(HttpResponse::Ok().json(response))
}

fn evidence_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

// Manual channel: payer uploads transfer evidence
async fn submit_evidence(
    req: HttpRequest,
    path: web::Path<PaymentId>,
    body: web::Bytes,
    data: AppState,
) -> Result<HttpResponse> {
    let payment_id = path.into_inner();
    let user = match get_auth_user(&req) {
        Some(user) => user,
        None => return Ok(unauthorized()),
    };

    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let Some(extension) = evidence_extension(content_type) else {
        return Ok(HttpResponse::UnsupportedMediaType()
            .json(ApiError::new("Evidence must be a JPEG, PNG or WEBP image")));
    };

    // Check preconditions before touching the filesystem.
    {
        let store = match store_guard(&data) {
            Ok(store) => store,
            Err(resp) => return Ok(resp),
        };
        let Some(payment) = store.manual_payments.get(&payment_id) else {
            return Ok(error_response(&Errors::UnknownPayment(payment_id)));
        };
        if payment.payer != *user.user_id() {
            return Ok(error_response(&Errors::NotPaymentOwner(payment_id)));
        }
    }

    let file_name = format!(
        "{}_{}.{}",
        payment_id,
        uuid::Uuid::new_v4().simple(),
        extension
    );
    let file_path = data.config.evidence_dir.join(&file_name);
    if let Err(e) = std::fs::create_dir_all(&data.config.evidence_dir)
        .and_then(|_| std::fs::write(&file_path, &body))
    {
        error!("Failed to store evidence {}: {}", file_path.display(), e);
        return Ok(HttpResponse::InternalServerError().json(ApiError::new("Failed to store evidence")));
    }

    let now = data.clock.now();
    let notice = {
        let mut store = match store_guard(&data) {
            Ok(store) => store,
            Err(resp) => return Ok(resp),
        };
        let Some(payment) = store.manual_payments.get_mut(&payment_id) else {
            return Ok(error_response(&Errors::UnknownPayment(payment_id)));
        };
        if let Err(e) = payment.submit_evidence(file_path.display().to_string(), now) {
            return Ok(error_response(&e));
        }

        let auction_id = payment.auction_id;
        let amount = payment.amount;
        let listing_id = store
            .auction(auction_id)
            .map(|a| a.listing_id)
            .unwrap_or_default();
        persist(&data, &store);

        PaymentNotice {
            payment_id,
            auction_id,
            listing_title: listing_title(&data, listing_id),
            amount,
            payer_name: user.display_name().to_string(),
            evidence_path: Some(file_path),
        }
    };

    // The reviewer channel is best effort; delivery failure must not undo
    // the submission.
    if let Some(handle) = data.notifier.payment_submitted(&notice).await {
        if let Ok(mut store) = data.store.lock() {
            if let Some(payment) = store.manual_payments.get_mut(&payment_id) {
                payment.notice_handle = Some(handle);
            }
            persist(&data, &store);
        }
    }

    Ok(HttpResponse::Ok().json(DecisionResponse {
        payment_id,
        status: manual::ManualStatus::WaitingConfirmation.to_string(),
        result: "submitted",
    }))
}

// Reviewer decision callback for manual payments
async fn payment_decision(
    req: HttpRequest,
    decision_req: web::Json<DecisionRequest>,
    data: AppState,
) -> Result<HttpResponse> {
    match get_auth_user(&req) {
        Some(User::Reviewer { .. }) => {}
        Some(_) => {
            return Ok(HttpResponse::Forbidden().json(ApiError::new("Reviewer access required")))
        }
        None => return Ok(unauthorized()),
    }

    let now = data.clock.now();
    let payment_id = decision_req.payment_id;

    let (outcome, notification) = {
        let mut store = match store_guard(&data) {
            Ok(store) => store,
            Err(resp) => return Ok(resp),
        };

        let outcome = match manual::decide(
            &mut store,
            payment_id,
            decision_req.decision,
            decision_req.reason.clone(),
            now,
        ) {
            Ok(outcome) => outcome,
            Err(e) => return Ok(error_response(&e)),
        };

        let notification = match &outcome {
            DecisionOutcome::Applied(status) => {
                persist(&data, &store);
                store.manual_payments.get(&payment_id).and_then(|payment| {
                    let handle = payment.notice_handle?;
                    let listing_id = store
                        .auction(payment.auction_id)
                        .map(|a| a.listing_id)
                        .unwrap_or_default();
                    let review_outcome = match status {
                        manual::ManualStatus::Rejected => ReviewOutcome::Rejected {
                            reason: payment
                                .reject_reason
                                .clone()
                                .unwrap_or_else(|| "Rejected by reviewer".to_string()),
                        },
                        _ => ReviewOutcome::Confirmed,
                    };
                    Some((
                        handle,
                        PaymentNotice {
                            payment_id,
                            auction_id: payment.auction_id,
                            listing_title: listing_title(&data, listing_id),
                            amount: payment.amount,
                            payer_name: payment.payer.clone(),
                            evidence_path: None,
                        },
                        review_outcome,
                    ))
                })
            }
            DecisionOutcome::AlreadyProcessed(_) => None,
        };

        (outcome, notification)
    };

    if let Some((handle, notice, review_outcome)) = notification {
        data.notifier
            .payment_resolved(handle, &notice, &review_outcome)
            .await;
    }

    let response = match outcome {
        DecisionOutcome::Applied(status) => DecisionResponse {
            payment_id,
            status: status.to_string(),
            result: "applied",
        },
        DecisionOutcome::AlreadyProcessed(status) => DecisionResponse {
            payment_id,
            status: status.to_string(),
            result: "already_processed",
        },
    };

    Ok(HttpResponse::Ok().json(response))
}

// Configure routes
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .route("/auctions", web::get().to(get_auctions))
            .route("/auctions", web::post().to(create_auction))
            .route("/auctions/{id}", web::get().to(get_auction))
            .route("/auctions/{id}/bids", web::post().to(place_bid))
            .route("/auctions/{id}/cancel", web::post().to(cancel_auction))
            .route("/auctions/{id}/payment", web::get().to(get_auction_payment))
            .route("/payments/gateway/prepare", web::post().to(gateway_prepare))
            .route(
                "/payments/gateway/complete",
                web::post().to(gateway_complete),
            )
            .route(
                "/payments/manual/{id}/evidence",
                web::post().to(submit_evidence),
            )
            .route(
                "/payments/manual/decision",
                web::post().to(payment_decision),
            ),
    );
}

/// Builds the application context from configuration, spawns the sweep
/// task and serves the API.
pub async fn run_app(config: AppConfig) -> std::io::Result<()> {
    let store = match &config.data_file {
        Some(path) if path.exists() => match json_file::read_store(path) {
            Ok(store) => store,
            Err(e) => {
                warn!("Could not load store snapshot, starting empty: {}", e);
                Store::new()
            }
        },
        _ => Store::new(),
    };
    let store = Arc::new(Mutex::new(store));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    let directory: Arc<dyn ListingDirectory> = match &config.listings_file {
        Some(path) => match StaticDirectory::from_file(path) {
            Ok(directory) => Arc::new(directory),
            Err(e) => {
                warn!("Could not load listings, directory is empty: {}", e);
                Arc::new(StaticDirectory::default())
            }
        },
        None => Arc::new(StaticDirectory::default()),
    };

    let notifier: Arc<dyn ReviewNotifier> = match &config.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(telegram)),
        None => Arc::new(DisabledNotifier),
    };

    tokio::spawn(scheduler::run(
        store.clone(),
        clock.clone(),
        config.sweep_interval_secs,
        config.data_file.clone(),
    ));

    let bind = (config.bind_addr.clone(), config.port);
    info!("Starting server on {}:{}", bind.0, bind.1);

    let ctx = web::Data::new(AppCtx {
        store,
        config,
        clock,
        directory,
        notifier,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(ctx.clone())
            .wrap(Logger::default())
            .configure(configure_app)
    })
    .bind(bind)?
    .run()
    .await
}
