//! blindprice
//!
//! Blind price negotiation between a buyer and a seller. Each side submits a
//! private price range; once both are in, the ranges are checked for overlap,
//! a volume-tiered platform fee is applied and a deal is created if the seller
//! still clears their floor.
//!
//! - `negotiation::OutcomeEvaluator` is the pure decision
//! - `negotiation::NegotiationEngine` runs the workflow over a `backend::Backend`
//! - `backend::InMemoryBackend` stands in for the hosted datastore, auth and blob storage

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod negotiation;
pub mod types;

// Re-export commonly used types
pub use backend::{Backend, InMemoryBackend};
pub use config::AppConfig;
pub use error::{BlindPriceError, Result};
pub use negotiation::{
    Deal, NegotiationEngine, Outcome, OutcomeEvaluator, PriceRange, SubmissionResult,
};
pub use types::{NegotiationID, Role, UserID};
