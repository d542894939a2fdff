use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::apply_security_headers;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/booking";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 10;
const DEFAULT_MAX_BOOKING_PER_USER: i64 = 4;
const DEFAULT_TOKEN_LOCK_SECS: u64 = 15 * 60;
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;
const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_EMAIL_FROM: &str = "no-reply@booking.local";

#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub max_booking_per_user: i64,
}

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub lock_duration: Duration,
}

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub queue_capacity: usize,
    pub email_from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_db_connections: u32,
    pub port: u16,
    pub currency: String,
    pub graceful_shutdown: Duration,
    pub cors_allowed_origins: Option<String>,
    pub production: bool,
    pub booking: BookingSettings,
    pub token: TokenSettings,
    pub notification: NotificationSettings,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Malformed values fall back to
    /// their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let production = lookup("RUST_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_db_connections: parse_or(&lookup, "MAX_DB_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            currency: lookup("CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            graceful_shutdown: Duration::from_secs(parse_or(
                &lookup,
                "GRACEFUL_SHUTDOWN_SECS",
                DEFAULT_GRACEFUL_SHUTDOWN_SECS,
            )),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS"),
            production,
            booking: BookingSettings {
                max_booking_per_user: parse_or(
                    &lookup,
                    "MAX_BOOKING_PER_USER",
                    DEFAULT_MAX_BOOKING_PER_USER,
                ),
            },
            token: TokenSettings {
                lock_duration: Duration::from_secs(parse_or(
                    &lookup,
                    "TOKEN_LOCK_DURATION_SECS",
                    DEFAULT_TOKEN_LOCK_SECS,
                )),
            },
            notification: NotificationSettings {
                queue_capacity: parse_or(
                    &lookup,
                    "NOTIFICATION_QUEUE_CAPACITY",
                    DEFAULT_QUEUE_CAPACITY,
                ),
                email_from: lookup("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            },
        }
    }

    pub fn lock_duration(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.token.lock_duration)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_TOKEN_LOCK_SECS as i64))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Config: invalid value '{}' for {}, using default", raw, key);
            default
        }),
    }
}
