//! Volume-based platform fee schedule

use crate::error::{BlindPriceError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A rate that applies from `min_count` prior negotiations upward
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    pub min_count: u64,
    pub rate: Decimal,
}

impl FeeTier {
    pub fn new(min_count: u64, rate: Decimal) -> Self {
        Self { min_count, rate }
    }
}

/// Sliding fee scale. Tiers are kept sorted by threshold, highest first, and
/// the first tier whose threshold the count reaches wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    tiers: Vec<FeeTier>,
}

impl FeeSchedule {
    /// Build a schedule from arbitrary tiers
    pub fn new(mut tiers: Vec<FeeTier>) -> Result<Self> {
        tiers.sort_by(|a, b| b.min_count.cmp(&a.min_count));

        if tiers.last().map(|t| t.min_count) != Some(0) {
            return Err(BlindPriceError::InvalidConfig(
                "fee schedule needs a tier starting at 0".to_string(),
            ));
        }
        if tiers.windows(2).any(|w| w[0].min_count == w[1].min_count) {
            return Err(BlindPriceError::InvalidConfig(
                "fee schedule has duplicate thresholds".to_string(),
            ));
        }
        if let Some(tier) = tiers
            .iter()
            .find(|t| t.rate < Decimal::ZERO || t.rate >= Decimal::ONE)
        {
            return Err(BlindPriceError::InvalidConfig(format!(
                "fee rate {} for tier {} is outside [0, 1)",
                tier.rate, tier.min_count
            )));
        }

        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[FeeTier] {
        &self.tiers
    }

    /// Rate for a requester with `prior_count` past negotiations
    pub fn rate_for(&self, prior_count: u64) -> Decimal {
        self.tiers
            .iter()
            .find(|tier| prior_count >= tier.min_count)
            .map(|tier| tier.rate)
            // new() guarantees a zero tier, which matches every count
            .unwrap_or(Decimal::ZERO)
    }

    /// Fee on a pre-fee price
    pub fn fee_for(&self, agreed_price: Decimal, prior_count: u64) -> Decimal {
        agreed_price * self.rate_for(prior_count)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            tiers: vec![
                FeeTier::new(100, Decimal::new(5, 3)),
                FeeTier::new(50, Decimal::new(7, 3)),
                FeeTier::new(20, Decimal::new(8, 3)),
                FeeTier::new(10, Decimal::new(9, 3)),
                FeeTier::new(0, Decimal::new(1, 2)),
            ],
        }
    }
}

/// Parses `"100:0.005,50:0.007,0:0.01"`
impl FromStr for FeeSchedule {
    type Err = BlindPriceError;

    fn from_str(s: &str) -> Result<Self> {
        let tiers = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| -> Result<FeeTier> {
                let (count, rate) = part.split_once(':').ok_or_else(|| {
                    BlindPriceError::InvalidConfig(format!("fee tier '{}' is not count:rate", part))
                })?;
                let min_count = count.trim().parse::<u64>().map_err(|e| {
                    BlindPriceError::InvalidConfig(format!("fee tier count '{}': {}", count, e))
                })?;
                let rate = Decimal::from_str(rate.trim()).map_err(|e| {
                    BlindPriceError::InvalidConfig(format!("fee tier rate '{}': {}", rate, e))
                })?;
                Ok(FeeTier::new(min_count, rate))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(tiers)
    }
}

impl fmt::Display for FeeSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .tiers
            .iter()
            .map(|tier| format!("{}:{}", tier.min_count, tier.rate))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}
