//! blindprice application wiring config, backend and engine

use crate::backend::InMemoryBackend;
use crate::config::AppConfig;
use crate::error::{BlindPriceError, Result};
use crate::negotiation::{
    Attachment, Deal, FeeSchedule, Negotiation, NegotiationEngine, NewNegotiation, Outcome,
    OutcomeEvaluator, PlatformStats, PriceRange, SubmissionResult,
};
use crate::types::{CurrentUser, NegotiationID, Role, UserID, UserRole};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// Ranges and history for a demo run
#[derive(Clone, Debug)]
pub struct DemoParams {
    pub seller_min: Decimal,
    pub seller_max: Decimal,
    pub buyer_min: Decimal,
    pub buyer_max: Decimal,
    pub buyer_history: u64,
    pub attachment: Option<Attachment>,
}

/// Everything a demo run produced
#[derive(Clone, Debug, Serialize)]
pub struct DemoReport {
    pub negotiation: Negotiation,
    pub outcome: Outcome,
    pub deal: Option<Deal>,
    pub stats: PlatformStats,
}

/// Main blindprice application
#[derive(Clone)]
pub struct BlindPriceApp {
    config: AppConfig,
    evaluator: OutcomeEvaluator,
}

impl BlindPriceApp {
    pub fn new(config: AppConfig) -> Self {
        let evaluator = config.evaluator.build();
        Self { config, evaluator }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        self.evaluator.fees()
    }

    /// One-off evaluation of two ranges
    pub fn evaluate(
        &self,
        buyer: (Decimal, Decimal),
        seller: (Decimal, Decimal),
        prior_count: u64,
    ) -> Result<Outcome> {
        let negotiation_id = NegotiationID::generate();
        let now = Utc::now();

        let buyer = PriceRange::new(
            negotiation_id.clone(),
            UserID::from("buyer"),
            Role::Buyer,
            buyer.0,
            buyer.1,
            now,
        )?;
        let seller = PriceRange::new(
            negotiation_id,
            UserID::from("seller"),
            Role::Seller,
            seller.0,
            seller.1,
            now,
        )?;

        self.evaluator.evaluate(&buyer, &seller, prior_count, now)
    }

    /// Run a seller and a buyer through a whole negotiation
    pub async fn run_demo(&self, params: DemoParams) -> Result<DemoReport> {
        let backend = InMemoryBackend::with_blob_base_url(self.config.blob_base_url.clone());

        let seller = CurrentUser::new("seller", "seller@blindprice.local", UserRole::User);
        let buyer = CurrentUser::new("buyer", "buyer@blindprice.local", UserRole::User);
        let admin = CurrentUser::new("admin", "admin@blindprice.local", UserRole::Admin);

        let engine_for = |user: CurrentUser| {
            NegotiationEngine::from_config(Arc::new(backend.session_for(user)), &self.config)
        };
        let seller_engine = engine_for(seller);
        let buyer_engine = engine_for(buyer.clone());
        let admin_engine = engine_for(admin);

        // Earlier negotiations opened by the buyer put them in a fee tier
        for i in 0..params.buyer_history {
            buyer_engine
                .create_negotiation(NewNegotiation {
                    title: format!("Earlier purchase #{}", i + 1),
                    description: String::new(),
                    role: Role::Buyer,
                    counterparty_id: UserID::from("past-seller"),
                    attachment: None,
                })
                .await?;
        }

        let negotiation = seller_engine
            .create_negotiation(NewNegotiation {
                title: "Demo listing".to_string(),
                description: "Created by blindprice demo".to_string(),
                role: Role::Seller,
                counterparty_id: buyer.id.clone(),
                attachment: params.attachment,
            })
            .await?;
        tracing::info!("Seller opened negotiation {}", negotiation.id);

        seller_engine
            .submit_range(&negotiation.id, params.seller_min, params.seller_max)
            .await?;
        tracing::info!("Seller submitted a private range");

        let outcome = match buyer_engine
            .submit_range(&negotiation.id, params.buyer_min, params.buyer_max)
            .await?
        {
            SubmissionResult::Evaluated(outcome) => outcome,
            other => {
                return Err(BlindPriceError::Internal(format!(
                    "second submission was not evaluated: {:?}",
                    other
                )))
            }
        };
        tracing::info!("Buyer submitted a private range");

        let negotiation = buyer_engine.negotiation(&negotiation.id).await?;
        let deal = buyer_engine.deal(&negotiation.id).await?;
        let stats = admin_engine.platform_stats().await?;

        Ok(DemoReport {
            negotiation,
            outcome,
            deal,
            stats,
        })
    }
}
