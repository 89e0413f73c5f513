// Copyright (c) 2025 - Cowboy AI, Inc.
//! Typed, env-driven configuration.
//!
//! Every tunable named in the external-interfaces table is a field here,
//! constructed once per process and threaded down by reference. Nothing
//! downstream reads the environment directly.

use std::env;
use std::time::Duration;

use crate::errors::{LibraryError, LibraryResult};

/// Money amounts and fees throughout configuration are integer minor units.
#[derive(Debug, Clone)]
pub struct Config {
    pub pagination_default_limit: u32,
    pub pagination_max_limit: u32,
    pub max_reservations_per_user: u32,
    pub book_reservation_fee: i64,
    pub book_return_due_date_days: i64,
    pub late_fee_per_day: i64,
    pub event_store_max_retry_attempts: u32,
    pub cache_default_ttl: Duration,
    pub nats_url: String,
    pub event_store_stream_name: String,
    pub event_bus_consumer_prefetch: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pagination_default_limit: 10,
            pagination_max_limit: 100,
            max_reservations_per_user: 3,
            book_reservation_fee: 300,
            book_return_due_date_days: 14,
            late_fee_per_day: 20,
            event_store_max_retry_attempts: 3,
            cache_default_ttl: Duration::from_secs(300),
            nats_url: "nats://localhost:4222".to_string(),
            event_store_stream_name: "LIBRARY_EVENTS".to_string(),
            event_bus_consumer_prefetch: 8,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    /// for any variable that is unset. A variable that is set but fails to
    /// parse is a startup error, not a silently-ignored default.
    pub fn from_env() -> LibraryResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            pagination_default_limit: parse_env("PAGINATION_DEFAULT_LIMIT", defaults.pagination_default_limit)?,
            pagination_max_limit: parse_env("PAGINATION_MAX_LIMIT", defaults.pagination_max_limit)?,
            max_reservations_per_user: parse_env("MAX_RESERVATIONS_PER_USER", defaults.max_reservations_per_user)?,
            book_reservation_fee: parse_env("BOOK_RESERVATION_FEE", defaults.book_reservation_fee)?,
            book_return_due_date_days: parse_env("BOOK_RETURN_DUE_DATE_DAYS", defaults.book_return_due_date_days)?,
            late_fee_per_day: parse_env("LATE_FEE_PER_DAY", defaults.late_fee_per_day)?,
            event_store_max_retry_attempts: parse_env(
                "EVENT_STORE_MAX_RETRY_ATTEMPTS",
                defaults.event_store_max_retry_attempts,
            )?,
            cache_default_ttl: Duration::from_secs(parse_env("CACHE_DEFAULT_TTL", defaults.cache_default_ttl.as_secs())?),
            nats_url: env::var("NATS_URL").unwrap_or(defaults.nats_url),
            event_store_stream_name: env::var("EVENT_STORE_STREAM_NAME").unwrap_or(defaults.event_store_stream_name),
            event_bus_consumer_prefetch: parse_env(
                "EVENT_BUS_CONSUMER_PREFETCH",
                defaults.event_bus_consumer_prefetch,
            )?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> LibraryResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| LibraryError::ValidationError(format!("invalid value for {key}: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.pagination_default_limit, 10);
        assert_eq!(cfg.pagination_max_limit, 100);
        assert_eq!(cfg.event_store_max_retry_attempts, 3);
    }

    #[test]
    fn from_env_falls_back_to_defaults_when_unset() {
        env::remove_var("PAGINATION_DEFAULT_LIMIT");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.pagination_default_limit, Config::default().pagination_default_limit);
    }
}
