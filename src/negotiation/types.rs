//! Negotiation records and outcome types

use crate::error::{BlindPriceError, Result};
use crate::types::{DealID, DealStatus, NegotiationID, NegotiationStatus, RangeID, Role, UserID};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Role of `current_user` in a negotiation opened by `initiator` as
/// `initiator_role`. Anyone who is not the initiator gets the opposite role.
pub fn infer_role(initiator: &UserID, initiator_role: Role, current_user: &UserID) -> Role {
    if initiator == current_user {
        initiator_role
    } else {
        initiator_role.opposite()
    }
}

/// Parent record linking two parties
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: NegotiationID,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub initiator_id: UserID,
    pub initiator_role: Role,
    pub counterparty_id: UserID,
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub status: NegotiationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Negotiation {
    /// Check whether the user is initiator or counterparty
    pub fn is_participant(&self, user: &UserID) -> bool {
        &self.initiator_id == user || &self.counterparty_id == user
    }

    /// Role of a participant, rejecting outsiders
    pub fn participant_role(&self, user: &UserID) -> Result<Role> {
        if !self.is_participant(user) {
            return Err(BlindPriceError::NotParticipant {
                negotiation: self.id.0.clone(),
                user: user.0.clone(),
            });
        }
        Ok(infer_role(&self.initiator_id, self.initiator_role, user))
    }

    /// Identity holding the given role
    pub fn party(&self, role: Role) -> &UserID {
        if role == self.initiator_role {
            &self.initiator_id
        } else {
            &self.counterparty_id
        }
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// One party's private price submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub id: RangeID,
    pub negotiation_id: NegotiationID,
    pub user_id: UserID,
    pub role: Role,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub submitted_at: DateTime<Utc>,
}

impl PriceRange {
    /// Create a validated range
    pub fn new(
        negotiation_id: NegotiationID,
        user_id: UserID,
        role: Role,
        min_price: Decimal,
        max_price: Decimal,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self> {
        let range = Self {
            id: RangeID::generate(),
            negotiation_id,
            user_id,
            role,
            min_price,
            max_price,
            submitted_at,
        };
        range.validate()?;
        Ok(range)
    }

    /// Check `0 < min <= max`
    pub fn validate(&self) -> Result<()> {
        if self.min_price <= Decimal::ZERO || self.max_price <= Decimal::ZERO {
            return Err(BlindPriceError::InvalidPriceRange(format!(
                "prices must be positive (min {}, max {})",
                self.min_price, self.max_price
            )));
        }
        if self.min_price > self.max_price {
            return Err(BlindPriceError::InvalidPriceRange(format!(
                "min {} exceeds max {}",
                self.min_price, self.max_price
            )));
        }
        Ok(())
    }
}

/// Result of a successful match between two ranges
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealID,
    pub negotiation_id: NegotiationID,
    pub buyer_id: UserID,
    pub seller_id: UserID,
    pub agreed_price: Decimal,
    pub fee_rate: Decimal,
    pub platform_fee: Decimal,
    pub final_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub status: DealStatus,
}

/// Why two ranges did not produce a deal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoDealReason {
    /// Seller's floor is above the buyer's ceiling
    NoOverlap {
        buyer_max: Decimal,
        seller_min: Decimal,
    },
    /// Ranges overlap but the fee pushes the final price under the seller's floor
    FeeExceedsMargin {
        final_price: Decimal,
        seller_min: Decimal,
    },
}

/// Evaluation result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Deal(Deal),
    NoDeal(NoDealReason),
}

impl Outcome {
    pub fn is_deal(&self) -> bool {
        matches!(self, Outcome::Deal(_))
    }

    pub fn deal(&self) -> Option<&Deal> {
        match self {
            Outcome::Deal(deal) => Some(deal),
            Outcome::NoDeal(_) => None,
        }
    }
}
