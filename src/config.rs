// src/config.rs
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::gateway::GatewayConfig;
use crate::money::Money;

/// How long an unpaid auction may sit in `pending_payment` before the
/// sweep cancels it.
pub const UNPAID_AUCTION_TTL_HOURS: i64 = 24;

/// Default interval between scheduler sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Timeout for outbound notifier calls; a slow reviewer channel must never
/// hold up a payment transition.
pub const NOTIFIER_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub admin_chat_id: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub gateway: GatewayConfig,
    /// Present when a reviewer channel is configured; otherwise
    /// notifications are disabled and payments proceed without them.
    pub telegram: Option<TelegramConfig>,
    /// Card number shown to manual-channel payers.
    pub card_number: String,
    /// Fixed listing fee charged per auction.
    pub listing_fee: Money,
    pub data_file: Option<PathBuf>,
    pub evidence_dir: PathBuf,
    pub listings_file: Option<PathBuf>,
    pub sweep_interval_secs: u64,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let telegram = match (env::var("TELEGRAM_BOT_TOKEN"), env::var("TELEGRAM_ADMIN_CHAT_ID")) {
            (Ok(bot_token), Ok(admin_chat_id)) => Some(TelegramConfig {
                bot_token,
                admin_chat_id,
            }),
            _ => None,
        };

        AppConfig {
            bind_addr: var_or("BIND_ADDR", "127.0.0.1"),
            port: var_or("PORT", "8080").parse().unwrap_or(8080),
            gateway: GatewayConfig {
                service_id: var_or("GATEWAY_SERVICE_ID", ""),
                secret_key: var_or("GATEWAY_SECRET_KEY", ""),
            },
            telegram,
            card_number: var_or("PAYMENT_CARD_NUMBER", ""),
            listing_fee: Money::from_str(&var_or("LISTING_FEE", "50000.00"))
                .unwrap_or_else(|_| Money::from_major(50000)),
            data_file: env::var("DATA_FILE").ok().map(PathBuf::from),
            evidence_dir: PathBuf::from(var_or("EVIDENCE_DIR", "evidence")),
            listings_file: env::var("LISTINGS_FILE").ok().map(PathBuf::from),
            sweep_interval_secs: var_or("SWEEP_INTERVAL_SECS", "60")
                .parse()
                .unwrap_or(SWEEP_INTERVAL_SECS),
        }
    }
}
