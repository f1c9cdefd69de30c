//! Runtime configuration read from `BLINDPRICE_*` environment variables

use crate::backend::memory::DEFAULT_BLOB_BASE_URL;
use crate::error::{BlindPriceError, Result};
use crate::negotiation::evaluator::DEFAULT_DEAL_VALIDITY_DAYS;
use crate::negotiation::{FeeSchedule, OutcomeEvaluator, SplitPolicy};
use chrono::Duration;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Days a pending negotiation stays open
pub const DEFAULT_NEGOTIATION_TTL_DAYS: i64 = 30;

/// Settings for deal evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorConfig {
    pub deal_validity_days: i64,
    pub split: SplitPolicy,
    pub fees: FeeSchedule,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            deal_validity_days: DEFAULT_DEAL_VALIDITY_DAYS,
            split: SplitPolicy::Midpoint,
            fees: FeeSchedule::default(),
        }
    }
}

impl EvaluatorConfig {
    pub fn build(&self) -> OutcomeEvaluator {
        OutcomeEvaluator::new(
            self.fees.clone(),
            self.split,
            Duration::days(self.deal_validity_days),
        )
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub evaluator: EvaluatorConfig,
    pub negotiation_ttl_days: i64,
    pub blob_base_url: String,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            evaluator: EvaluatorConfig::default(),
            negotiation_ttl_days: DEFAULT_NEGOTIATION_TTL_DAYS,
            blob_base_url: DEFAULT_BLOB_BASE_URL.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create application config from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let deal_validity_days = parse_var(&lookup, "BLINDPRICE_DEAL_VALIDITY_DAYS")?
            .unwrap_or(defaults.evaluator.deal_validity_days);
        let negotiation_ttl_days = parse_var(&lookup, "BLINDPRICE_NEGOTIATION_TTL_DAYS")?
            .unwrap_or(defaults.negotiation_ttl_days);

        let split = match parse_var::<Decimal, _>(&lookup, "BLINDPRICE_SELLER_SHARE")? {
            Some(share) => SplitPolicy::weighted(share)?,
            None => defaults.evaluator.split,
        };

        let fees = match lookup("BLINDPRICE_FEE_TIERS") {
            Some(raw) => raw.parse::<FeeSchedule>()?,
            None => defaults.evaluator.fees,
        };

        let blob_base_url = lookup("BLINDPRICE_BLOB_BASE_URL").unwrap_or(defaults.blob_base_url);
        let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);

        // Validate configuration
        if deal_validity_days <= 0 {
            return Err(BlindPriceError::InvalidConfig(
                "BLINDPRICE_DEAL_VALIDITY_DAYS must be greater than 0".to_string(),
            ));
        }

        if negotiation_ttl_days <= 0 {
            return Err(BlindPriceError::InvalidConfig(
                "BLINDPRICE_NEGOTIATION_TTL_DAYS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            evaluator: EvaluatorConfig {
                deal_validity_days,
                split,
                fees,
            },
            negotiation_ttl_days,
            blob_base_url,
            log_level,
        })
    }

    pub fn negotiation_ttl(&self) -> Duration {
        Duration::days(self.negotiation_ttl_days)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| BlindPriceError::InvalidConfig(format!("{}='{}': {}", key, raw, e)))
        })
        .transpose()
}
