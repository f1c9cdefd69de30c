//! Error types for blindprice

use thiserror::Error;

/// Main error type for blindprice
#[derive(Error, Debug)]
pub enum BlindPriceError {
    // Input errors
    #[error("Invalid price range: {0}")]
    InvalidPriceRange(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Negotiation errors
    #[error("Negotiation not found: {0}")]
    NegotiationNotFound(String),

    #[error("User {user} is not a participant of negotiation {negotiation}")]
    NotParticipant { negotiation: String, user: String },

    #[error("Price range already submitted for negotiation {0}")]
    RangeAlreadySubmitted(String),

    #[error("Invalid negotiation state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Negotiation expired: {0}")]
    NegotiationExpired(String),

    // Auth errors
    #[error("No user is signed in")]
    Unauthenticated,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Datastore errors
    #[error("Duplicate record in {collection}: {key}")]
    DuplicateRecord { collection: String, key: String },

    #[error("Record not found in {collection}: {id}")]
    RecordNotFound { collection: String, id: String },

    #[error("Invalid record in {collection}: {reason}")]
    InvalidRecord { collection: String, reason: String },

    #[error("State corruption detected: {0}")]
    StateCorruption(String),

    #[error("Blob upload failed: {0}")]
    BlobUpload(String),

    // Configuration errors
    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for blindprice operations
pub type Result<T> = std::result::Result<T, BlindPriceError>;

impl BlindPriceError {
    /// Whether the error came from a datastore uniqueness constraint
    pub fn is_duplicate(&self) -> bool {
        matches!(self, BlindPriceError::DuplicateRecord { .. })
    }
}
