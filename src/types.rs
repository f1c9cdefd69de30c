//! Core types used throughout blindprice

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new unique ID (timestamp plus random suffix)
            pub fn generate() -> Self {
                let millis = chrono::Utc::now().timestamp_millis();
                let suffix: u32 = rand::random();
                Self(format!(concat!($prefix, "_{}_{:08x}"), millis, suffix))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_type!(
    /// Unique identifier for negotiations
    NegotiationID,
    "neg"
);
id_type!(
    /// Identity of an authenticated user
    UserID,
    "user"
);
id_type!(
    /// Unique identifier for a submitted price range
    RangeID,
    "range"
);
id_type!(
    /// Unique identifier for deals
    DealID,
    "deal"
);

impl DealID {
    /// Deal ID for a negotiation. A negotiation has at most one deal, so the
    /// ID is derived rather than generated.
    pub fn for_negotiation(negotiation_id: &NegotiationID) -> Self {
        Self(format!("deal_{}", negotiation_id))
    }
}

/// Side a participant takes in a negotiation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    /// The other side. Only two roles exist.
    pub fn opposite(self) -> Self {
        match self {
            Role::Buyer => Role::Seller,
            Role::Seller => Role::Buyer,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a negotiation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationStatus {
    Pending,
    Completed,
    Expired,
    Cancelled,
}

impl NegotiationStatus {
    /// Check if negotiation is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NegotiationStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationStatus::Pending => "pending",
            NegotiationStatus::Completed => "completed",
            NegotiationStatus::Expired => "expired",
            NegotiationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a deal. Only `Active` is produced here; the rest belong to
/// settlement outside this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    Active,
    Fulfilled,
    Expired,
    Cancelled,
}

/// Access level of an authenticated user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

/// Identity yielded by the authentication provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserID,
    pub email: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: UserID(id.into()),
            email: email.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation_id_creation() {
        let id1 = NegotiationID::generate();
        let id2 = NegotiationID::generate();

        assert!(id1.as_str().starts_with("neg_"));
        // Random suffix keeps IDs generated in the same millisecond apart
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_deal_id_is_derived() {
        let negotiation = NegotiationID::from("neg_42");
        assert_eq!(DealID::for_negotiation(&negotiation).as_str(), "deal_neg_42");
        assert_eq!(
            DealID::for_negotiation(&negotiation),
            DealID::for_negotiation(&negotiation)
        );
    }

    #[test]
    fn test_role_opposite() {
        assert_eq!(Role::Buyer.opposite(), Role::Seller);
        assert_eq!(Role::Seller.opposite(), Role::Buyer);
        assert_eq!(Role::Buyer.opposite().opposite(), Role::Buyer);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!NegotiationStatus::Pending.is_terminal());
        assert!(NegotiationStatus::Completed.is_terminal());
        assert!(NegotiationStatus::Expired.is_terminal());
        assert!(NegotiationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_serialization() {
        assert_eq!(serde_json::to_string(&Role::Seller).unwrap(), "\"seller\"");
        assert_eq!(
            serde_json::to_string(&NegotiationStatus::Pending).unwrap(),
            "\"pending\""
        );

        let id = UserID::from("alice");
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, "\"alice\"");
        let deserialized: UserID = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id, deserialized);
    }
}
