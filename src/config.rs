use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// How long a claimed driver has to accept before the claim expires.
    pub claim_window_secs: i64,
    /// Period of the expiry scanner. Kept close to the claim window so a
    /// claim expires within one sweep cycle of its deadline.
    pub sweep_interval_secs: u64,
    /// Fixed candidate-search ceiling; per-driver service radius is stored
    /// but not consulted by matching.
    pub search_radius_km: f64,
    /// Absolute TTL on a request, independent of any claim window.
    pub request_ttl_secs: i64,
    pub match_queue_size: usize,
    pub event_buffer_size: usize,
    pub tx_retry_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            claim_window_secs: 30,
            sweep_interval_secs: 10,
            search_radius_km: 50.0,
            request_ttl_secs: 600,
            match_queue_size: 1024,
            event_buffer_size: 1024,
            tx_retry_limit: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            claim_window_secs: parse_or_default("CLAIM_WINDOW_SECS", defaults.claim_window_secs)?,
            sweep_interval_secs: parse_or_default(
                "SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
            search_radius_km: parse_or_default("SEARCH_RADIUS_KM", defaults.search_radius_km)?,
            request_ttl_secs: parse_or_default("REQUEST_TTL_SECS", defaults.request_ttl_secs)?,
            match_queue_size: parse_or_default("MATCH_QUEUE_SIZE", defaults.match_queue_size)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            tx_retry_limit: parse_or_default("TX_RETRY_LIMIT", defaults.tx_retry_limit)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
