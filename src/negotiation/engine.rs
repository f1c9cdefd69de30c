//! Negotiation engine drives negotiations through the backend

use crate::backend::{Backend, Filter, Store};
use crate::config::{AppConfig, DEFAULT_NEGOTIATION_TTL_DAYS};
use crate::error::{BlindPriceError, Result};
use crate::types::{CurrentUser, NegotiationID, NegotiationStatus, Role, UserID};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use super::evaluator::OutcomeEvaluator;
use super::types::{Deal, Negotiation, Outcome, PriceRange};

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// File attached to a new negotiation
#[derive(Clone, Debug)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Load a file from disk, named after its last path component
    pub async fn read(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                BlindPriceError::InvalidInput(format!(
                    "attachment path {} has no file name",
                    path.display()
                ))
            })?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { file_name, bytes })
    }
}

/// Input for opening a negotiation
#[derive(Clone, Debug)]
pub struct NewNegotiation {
    pub title: String,
    pub description: String,
    /// Side the initiator takes
    pub role: Role,
    pub counterparty_id: UserID,
    pub attachment: Option<Attachment>,
}

/// What happened after a price range was accepted
#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionResult {
    /// The other participant has not submitted yet
    AwaitingCounterparty(PriceRange),
    /// Both ranges were present and this submission ran the evaluation
    Evaluated(Outcome),
    /// A concurrent submission already created the deal
    AlreadyEvaluated,
}

/// Platform-wide totals for administrators
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PlatformStats {
    pub total_negotiations: usize,
    pub pending: usize,
    pub completed: usize,
    pub expired: usize,
    pub cancelled: usize,
    pub deals: usize,
    pub total_volume: Decimal,
    pub total_fees: Decimal,
}

/// Negotiation engine acting on behalf of the backend's signed-in user
#[derive(Clone)]
pub struct NegotiationEngine {
    store: Store,
    evaluator: OutcomeEvaluator,
    negotiation_ttl: Duration,
    clock: Clock,
}

impl NegotiationEngine {
    /// Create new negotiation engine
    pub fn new(backend: Arc<dyn Backend>, evaluator: OutcomeEvaluator) -> Self {
        tracing::debug!("Negotiation engine using {} backend", backend.backend_tag());
        Self {
            store: Store::new(backend),
            evaluator,
            negotiation_ttl: Duration::days(DEFAULT_NEGOTIATION_TTL_DAYS),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn from_config(backend: Arc<dyn Backend>, config: &AppConfig) -> Self {
        Self::new(backend, config.evaluator.build()).with_negotiation_ttl(config.negotiation_ttl())
    }

    pub fn with_negotiation_ttl(mut self, ttl: Duration) -> Self {
        self.negotiation_ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn evaluator(&self) -> &OutcomeEvaluator {
        &self.evaluator
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn require_user(&self) -> Result<CurrentUser> {
        self.store
            .backend()
            .current_user()
            .await?
            .ok_or(BlindPriceError::Unauthenticated)
    }

    async fn load_negotiation(&self, id: &NegotiationID) -> Result<Negotiation> {
        self.store
            .get::<Negotiation>(id.as_str())
            .await?
            .ok_or_else(|| BlindPriceError::NegotiationNotFound(id.0.clone()))
    }

    fn ensure_visible(negotiation: &Negotiation, user: &CurrentUser) -> Result<()> {
        if user.is_admin() || negotiation.is_participant(&user.id) {
            return Ok(());
        }
        Err(BlindPriceError::NotParticipant {
            negotiation: negotiation.id.0.clone(),
            user: user.id.0.clone(),
        })
    }

    /// Open a negotiation with the signed-in user as initiator
    pub async fn create_negotiation(&self, request: NewNegotiation) -> Result<Negotiation> {
        let user = self.require_user().await?;

        let title = request.title.trim();
        if title.is_empty() {
            return Err(BlindPriceError::InvalidInput("title is required".to_string()));
        }
        if request.counterparty_id == user.id {
            return Err(BlindPriceError::InvalidInput(
                "cannot negotiate with yourself".to_string(),
            ));
        }

        let attachment_url = match request.attachment {
            Some(attachment) => Some(
                self.store
                    .backend()
                    .upload_blob(&attachment.file_name, attachment.bytes)
                    .await?,
            ),
            None => None,
        };

        let now = self.now();
        let negotiation = Negotiation {
            id: NegotiationID::generate(),
            title: title.to_string(),
            description: request.description,
            initiator_id: user.id.clone(),
            initiator_role: request.role,
            counterparty_id: request.counterparty_id,
            attachment_url,
            status: NegotiationStatus::Pending,
            created_at: now,
            expires_at: now + self.negotiation_ttl,
        };

        self.store.insert(&negotiation).await?;

        tracing::info!(
            "Created negotiation {} ({} as {}, counterparty {})",
            negotiation.id,
            user.id,
            negotiation.initiator_role,
            negotiation.counterparty_id
        );

        Ok(negotiation)
    }

    /// Negotiation details, visible to participants and admins
    pub async fn negotiation(&self, id: &NegotiationID) -> Result<Negotiation> {
        let user = self.require_user().await?;
        let negotiation = self.load_negotiation(id).await?;
        Self::ensure_visible(&negotiation, &user)?;
        Ok(negotiation)
    }

    /// Negotiations the signed-in user takes part in, newest first
    pub async fn dashboard(&self) -> Result<Vec<Negotiation>> {
        let user = self.require_user().await?;

        let mut negotiations = self
            .store
            .find::<Negotiation>(&Filter::all().eq("initiator_id", user.id.as_str()))
            .await?;
        negotiations.extend(
            self.store
                .find::<Negotiation>(&Filter::all().eq("counterparty_id", user.id.as_str()))
                .await?,
        );

        negotiations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(negotiations)
    }

    /// Submit the signed-in user's private range. When this is the second
    /// range the negotiation is evaluated and a deal persisted on success.
    pub async fn submit_range(
        &self,
        negotiation_id: &NegotiationID,
        min_price: Decimal,
        max_price: Decimal,
    ) -> Result<SubmissionResult> {
        let user = self.require_user().await?;
        let negotiation = self.load_negotiation(negotiation_id).await?;
        let now = self.now();

        if negotiation.status.is_terminal() {
            return Err(BlindPriceError::InvalidStateTransition(format!(
                "negotiation {} is already {}",
                negotiation_id, negotiation.status
            )));
        }
        if negotiation.is_past_deadline(now) {
            return Err(BlindPriceError::NegotiationExpired(negotiation_id.0.clone()));
        }

        let role = negotiation.participant_role(&user.id)?;
        let range = PriceRange::new(
            negotiation_id.clone(),
            user.id.clone(),
            role,
            min_price,
            max_price,
            now,
        )?;

        match self.store.insert(&range).await {
            Err(e) if e.is_duplicate() => {
                return Err(BlindPriceError::RangeAlreadySubmitted(negotiation_id.0.clone()))
            }
            other => other?,
        }

        tracing::info!(
            "{} submitted a {} range for negotiation {}",
            user.id,
            role,
            negotiation_id
        );

        let ranges = self
            .store
            .find::<PriceRange>(&Filter::all().eq("negotiation_id", negotiation_id.as_str()))
            .await?;

        if ranges.len() < 2 {
            return Ok(SubmissionResult::AwaitingCounterparty(range));
        }

        let (buyer, seller) = Self::pick_sides(&negotiation, &ranges)?;
        let prior_count = self.prior_negotiation_count(&user.id, &negotiation).await?;
        let outcome = self.evaluator.evaluate(buyer, seller, prior_count, now)?;

        match &outcome {
            Outcome::Deal(deal) => {
                match self.store.insert(deal).await {
                    Err(e) if e.is_duplicate() => {
                        tracing::warn!(
                            "Deal for negotiation {} already exists, skipping",
                            negotiation_id
                        );
                        // The winner may not have flipped the status yet
                        self.mark_completed(negotiation_id).await?;
                        return Ok(SubmissionResult::AlreadyEvaluated);
                    }
                    other => other?,
                }

                self.mark_completed(negotiation_id).await?;

                tracing::info!(
                    "Negotiation {} completed: agreed {} fee {} final {}",
                    negotiation_id,
                    deal.agreed_price,
                    deal.platform_fee,
                    deal.final_price
                );
            }
            Outcome::NoDeal(reason) => {
                tracing::info!("Negotiation {} produced no deal: {:?}", negotiation_id, reason);
            }
        }

        Ok(SubmissionResult::Evaluated(outcome))
    }

    async fn mark_completed(&self, negotiation_id: &NegotiationID) -> Result<()> {
        self.store
            .update::<Negotiation>(
                negotiation_id.as_str(),
                json!({ "status": NegotiationStatus::Completed }),
            )
            .await
    }

    /// Exactly one range per role, each submitted by the party holding it
    fn pick_sides<'a>(
        negotiation: &Negotiation,
        ranges: &'a [PriceRange],
    ) -> Result<(&'a PriceRange, &'a PriceRange)> {
        if ranges.len() != 2 {
            return Err(BlindPriceError::StateCorruption(format!(
                "negotiation {} has {} ranges",
                negotiation.id,
                ranges.len()
            )));
        }

        let side = |role: Role| {
            ranges
                .iter()
                .find(|r| r.role == role && &r.user_id == negotiation.party(role))
                .ok_or_else(|| {
                    BlindPriceError::StateCorruption(format!(
                        "negotiation {} has no {} range from {}",
                        negotiation.id,
                        role,
                        negotiation.party(role)
                    ))
                })
        };

        Ok((side(Role::Buyer)?, side(Role::Seller)?))
    }

    /// Negotiations the user initiated strictly before `current` was created.
    /// Every status counts, cancelled and expired included.
    async fn prior_negotiation_count(&self, user: &UserID, current: &Negotiation) -> Result<u64> {
        let initiated = self
            .store
            .find::<Negotiation>(&Filter::all().eq("initiator_id", user.as_str()))
            .await?;
        Ok(initiated
            .iter()
            .filter(|n| n.id != current.id && n.created_at < current.created_at)
            .count() as u64)
    }

    /// The deal of a negotiation, if one was made
    pub async fn deal(&self, negotiation_id: &NegotiationID) -> Result<Option<Deal>> {
        let negotiation = self.negotiation(negotiation_id).await?;
        let mut deals = self
            .store
            .find::<Deal>(&Filter::all().eq("negotiation_id", negotiation.id.as_str()))
            .await?;
        Ok(deals.pop())
    }

    /// Cancel a pending negotiation. Only the initiator may cancel.
    pub async fn cancel(&self, negotiation_id: &NegotiationID) -> Result<()> {
        let user = self.require_user().await?;
        let negotiation = self.load_negotiation(negotiation_id).await?;

        if negotiation.initiator_id != user.id {
            return Err(BlindPriceError::Unauthorized(format!(
                "only the initiator can cancel negotiation {}",
                negotiation_id
            )));
        }
        if negotiation.status.is_terminal() {
            return Err(BlindPriceError::InvalidStateTransition(format!(
                "cannot cancel negotiation {} in state {}",
                negotiation_id, negotiation.status
            )));
        }

        self.store
            .update::<Negotiation>(
                negotiation_id.as_str(),
                json!({ "status": NegotiationStatus::Cancelled }),
            )
            .await?;

        tracing::info!("Negotiation {} cancelled by {}", negotiation_id, user.id);
        Ok(())
    }

    /// Flip pending negotiations past their deadline, as seen by the engine's
    /// clock, to expired
    pub async fn expire_stale(&self) -> Result<usize> {
        let now = self.now();
        let pending = self
            .store
            .find::<Negotiation>(&Filter::all().eq("status", NegotiationStatus::Pending.as_str()))
            .await?;

        let mut expired = 0;
        for negotiation in pending.iter().filter(|n| n.is_past_deadline(now)) {
            self.store
                .update::<Negotiation>(
                    negotiation.id.as_str(),
                    json!({ "status": NegotiationStatus::Expired }),
                )
                .await?;
            expired += 1;
        }

        if expired > 0 {
            tracing::info!("Expired {} stale negotiations", expired);
        }
        Ok(expired)
    }

    /// Totals across all negotiations and deals. Admins only.
    pub async fn platform_stats(&self) -> Result<PlatformStats> {
        let user = self.require_user().await?;
        if !user.is_admin() {
            return Err(BlindPriceError::Unauthorized(
                "platform statistics require an admin".to_string(),
            ));
        }

        let negotiations = self.store.find::<Negotiation>(&Filter::all()).await?;
        let deals = self.store.find::<Deal>(&Filter::all()).await?;

        let mut stats = PlatformStats {
            total_negotiations: negotiations.len(),
            deals: deals.len(),
            ..PlatformStats::default()
        };
        for negotiation in &negotiations {
            match negotiation.status {
                NegotiationStatus::Pending => stats.pending += 1,
                NegotiationStatus::Completed => stats.completed += 1,
                NegotiationStatus::Expired => stats.expired += 1,
                NegotiationStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats.total_volume = deals.iter().map(|d| d.agreed_price).sum();
        stats.total_fees = deals.iter().map(|d| d.platform_fee).sum();

        Ok(stats)
    }
}
