//! Outcome evaluation: price-range intersection, fee and deal construction
//!
//! The evaluator is a pure function of its inputs. It reads no clock and
//! touches no storage; the caller supplies `now` and persists the result.

use crate::error::{BlindPriceError, Result};
use crate::types::{DealID, DealStatus, Role};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::fees::FeeSchedule;
use super::types::{Deal, NoDealReason, Outcome, PriceRange};

/// How long a deal stays valid after creation
pub const DEFAULT_DEAL_VALIDITY_DAYS: i64 = 7;

/// How the overlap between seller floor and buyer ceiling is split
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Halfway between seller floor and buyer ceiling
    Midpoint,
    /// `seller_min + (buyer_max - seller_min) * seller_share`
    Weighted { seller_share: Decimal },
}

impl SplitPolicy {
    pub fn weighted(seller_share: Decimal) -> Result<Self> {
        if seller_share < Decimal::ZERO || seller_share > Decimal::ONE {
            return Err(BlindPriceError::InvalidConfig(format!(
                "seller share {} is outside [0, 1]",
                seller_share
            )));
        }
        Ok(SplitPolicy::Weighted { seller_share })
    }

    /// Pre-fee price for an overlapping buyer ceiling and seller floor.
    ///
    /// Offsets from the floor by a share of the spread, so the result never
    /// leaves `[seller_min, buyer_max]` and never exceeds `Decimal::MAX`.
    pub fn agreed_price(&self, buyer_max: Decimal, seller_min: Decimal) -> Result<Decimal> {
        let spread = buyer_max.checked_sub(seller_min).ok_or_else(|| {
            BlindPriceError::InvalidInput(format!(
                "spread between {} and {} is out of range",
                seller_min, buyer_max
            ))
        })?;
        let offset = match self {
            SplitPolicy::Midpoint => spread.checked_div(Decimal::TWO),
            SplitPolicy::Weighted { seller_share } => spread.checked_mul(*seller_share),
        };
        offset
            .and_then(|offset| seller_min.checked_add(offset))
            .ok_or_else(|| {
                BlindPriceError::InvalidInput(format!(
                    "agreed price between {} and {} is out of range",
                    seller_min, buyer_max
                ))
            })
    }
}

impl Default for SplitPolicy {
    fn default() -> Self {
        SplitPolicy::Midpoint
    }
}

/// Decides whether two price ranges produce a deal
#[derive(Clone, Debug)]
pub struct OutcomeEvaluator {
    fees: FeeSchedule,
    split: SplitPolicy,
    validity: Duration,
}

impl OutcomeEvaluator {
    pub fn new(fees: FeeSchedule, split: SplitPolicy, validity: Duration) -> Self {
        Self {
            fees,
            split,
            validity,
        }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn split(&self) -> SplitPolicy {
        self.split
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Evaluate a buyer range against a seller range.
    ///
    /// `requester_prior_count` is the number of past negotiations initiated by
    /// whoever triggered the evaluation and only selects the fee tier.
    pub fn evaluate(
        &self,
        buyer: &PriceRange,
        seller: &PriceRange,
        requester_prior_count: u64,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        Self::check_inputs(buyer, seller)?;

        let buyer_max = buyer.max_price;
        let seller_min = seller.min_price;

        if seller_min > buyer_max {
            tracing::debug!(
                negotiation = %buyer.negotiation_id,
                %buyer_max,
                %seller_min,
                "Price ranges do not overlap"
            );
            return Ok(Outcome::NoDeal(NoDealReason::NoOverlap {
                buyer_max,
                seller_min,
            }));
        }

        let agreed_price = self.split.agreed_price(buyer_max, seller_min)?;
        let fee_rate = self.fees.rate_for(requester_prior_count);
        let platform_fee = self.fees.fee_for(agreed_price, requester_prior_count);
        let final_price = agreed_price - platform_fee;

        tracing::debug!(
            negotiation = %buyer.negotiation_id,
            %buyer_max,
            %seller_min,
            %agreed_price,
            %fee_rate,
            %platform_fee,
            %final_price,
            "Evaluated price ranges"
        );

        if final_price < seller_min {
            return Ok(Outcome::NoDeal(NoDealReason::FeeExceedsMargin {
                final_price,
                seller_min,
            }));
        }

        Ok(Outcome::Deal(Deal {
            id: DealID::for_negotiation(&buyer.negotiation_id),
            negotiation_id: buyer.negotiation_id.clone(),
            buyer_id: buyer.user_id.clone(),
            seller_id: seller.user_id.clone(),
            agreed_price,
            fee_rate,
            platform_fee,
            final_price,
            created_at: now,
            valid_until: now + self.validity,
            status: DealStatus::Active,
        }))
    }

    fn check_inputs(buyer: &PriceRange, seller: &PriceRange) -> Result<()> {
        if buyer.role != Role::Buyer {
            return Err(BlindPriceError::InvalidInput(format!(
                "buyer range {} is tagged {}",
                buyer.id, buyer.role
            )));
        }
        if seller.role != Role::Seller {
            return Err(BlindPriceError::InvalidInput(format!(
                "seller range {} is tagged {}",
                seller.id, seller.role
            )));
        }
        if buyer.negotiation_id != seller.negotiation_id {
            return Err(BlindPriceError::InvalidInput(format!(
                "ranges belong to different negotiations ({} vs {})",
                buyer.negotiation_id, seller.negotiation_id
            )));
        }
        buyer.validate()?;
        seller.validate()?;
        Ok(())
    }
}

impl Default for OutcomeEvaluator {
    fn default() -> Self {
        Self::new(
            FeeSchedule::default(),
            SplitPolicy::default(),
            Duration::days(DEFAULT_DEAL_VALIDITY_DAYS),
        )
    }
}
