//! Negotiation module for blind price matching

pub mod engine;
pub mod evaluator;
pub mod fees;
pub mod types;

pub use engine::{
    Attachment, Clock, NegotiationEngine, NewNegotiation, PlatformStats, SubmissionResult,
};
pub use evaluator::{OutcomeEvaluator, SplitPolicy};
pub use fees::{FeeSchedule, FeeTier};
pub use types::{infer_role, Deal, Negotiation, NoDealReason, Outcome, PriceRange};
