//! End-to-end negotiation flows against the in-memory backend

use async_trait::async_trait;
use blindprice::backend::{Backend, Collection, Document, Filter, InMemoryBackend};
use blindprice::negotiation::{
    Attachment, NegotiationEngine, NewNegotiation, NoDealReason, Outcome, OutcomeEvaluator,
    SubmissionResult,
};
use blindprice::types::{CurrentUser, NegotiationStatus, Role, UserID, UserRole};
use blindprice::{BlindPriceError, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Barrier;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn user(id: &str) -> CurrentUser {
    CurrentUser::new(id, format!("{}@example.com", id), UserRole::User)
}

fn engine(backend: &InMemoryBackend, who: CurrentUser) -> NegotiationEngine {
    NegotiationEngine::new(Arc::new(backend.session_for(who)), OutcomeEvaluator::default())
}

fn engine_at(backend: &InMemoryBackend, who: CurrentUser, now: DateTime<Utc>) -> NegotiationEngine {
    engine(backend, who).with_clock(Arc::new(move || now))
}

/// Holds every price-range insert until all parties have inserted theirs, so
/// each submitter sees both ranges and runs the evaluation itself.
struct RangeBarrier {
    inner: InMemoryBackend,
    barrier: Arc<Barrier>,
}

#[async_trait]
impl Backend for RangeBarrier {
    fn backend_tag(&self) -> &'static str {
        "range-barrier"
    }

    async fn create(&self, collection: Collection, id: &str, document: Document) -> Result<()> {
        let created = self.inner.create(collection, id, document).await;
        if collection == Collection::PriceRanges {
            self.barrier.wait().await;
        }
        created
    }

    async fn list(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
        self.inner.list(collection, filter).await
    }

    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<()> {
        self.inner.update(collection, id, patch).await
    }

    async fn current_user(&self) -> Result<Option<CurrentUser>> {
        self.inner.current_user().await
    }

    async fn upload_blob(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        self.inner.upload_blob(file_name, bytes).await
    }
}

fn listing(role: Role, counterparty: &str) -> NewNegotiation {
    NewNegotiation {
        title: "Road bike".to_string(),
        description: "Carbon frame, size 56".to_string(),
        role,
        counterparty_id: UserID::from(counterparty),
        attachment: None,
    }
}

/// Seller opens, seller submits, buyer submits last
async fn run(seller_range: (&str, &str), buyer_range: (&str, &str)) -> SubmissionResult {
    let backend = InMemoryBackend::new();
    let seller = engine(&backend, user("sam"));
    let buyer = engine(&backend, user("bea"));

    let negotiation = seller
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();
    seller
        .submit_range(&negotiation.id, dec(seller_range.0), dec(seller_range.1))
        .await
        .unwrap();
    buyer
        .submit_range(&negotiation.id, dec(buyer_range.0), dec(buyer_range.1))
        .await
        .unwrap()
}

#[tokio::test]
async fn deal_at_base_rate() {
    let result = run(("900", "1100"), ("800", "1000")).await;

    let SubmissionResult::Evaluated(Outcome::Deal(deal)) = result else {
        panic!("expected deal");
    };
    assert_eq!(deal.agreed_price, dec("950"));
    assert_eq!(deal.platform_fee, dec("9.50"));
    assert_eq!(deal.final_price, dec("940.50"));
    assert_eq!(deal.valid_until - deal.created_at, Duration::days(7));
}

#[tokio::test]
async fn fee_erodes_thin_margin() {
    let result = run(("999.99", "1500"), ("500", "1000")).await;

    assert_eq!(
        result,
        SubmissionResult::Evaluated(Outcome::NoDeal(NoDealReason::FeeExceedsMargin {
            final_price: dec("989.99505"),
            seller_min: dec("999.99"),
        }))
    );
}

#[tokio::test]
async fn ranges_without_overlap() {
    let result = run(("850", "950"), ("600", "800")).await;

    assert!(matches!(
        result,
        SubmissionResult::Evaluated(Outcome::NoDeal(NoDealReason::NoOverlap { .. }))
    ));
}

#[tokio::test]
async fn concurrent_final_submissions_create_one_deal() {
    let backend = InMemoryBackend::new();
    let seller = engine(&backend, user("sam"));
    let buyer = engine(&backend, user("bea"));

    let negotiation = seller
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();

    let (seller_result, buyer_result) = tokio::join!(
        seller.submit_range(&negotiation.id, dec("900"), dec("1100")),
        buyer.submit_range(&negotiation.id, dec("800"), dec("1000")),
    );
    let results = [seller_result.unwrap(), buyer_result.unwrap()];

    let deals_reported = results
        .iter()
        .filter(|r| matches!(r, SubmissionResult::Evaluated(Outcome::Deal(_))))
        .count();
    assert_eq!(deals_reported, 1);
    assert_eq!(backend.count(Collection::Deals).await, 1);
    assert_eq!(
        seller.negotiation(&negotiation.id).await.unwrap().status,
        NegotiationStatus::Completed
    );
}

#[tokio::test]
async fn racing_evaluations_persist_one_deal() {
    let backend = InMemoryBackend::new();
    let barrier = Arc::new(Barrier::new(2));
    let gated = |who: CurrentUser| {
        NegotiationEngine::new(
            Arc::new(RangeBarrier {
                inner: backend.session_for(who),
                barrier: barrier.clone(),
            }),
            OutcomeEvaluator::default(),
        )
    };
    let seller = gated(user("sam"));
    let buyer = gated(user("bea"));

    let negotiation = seller
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();

    let (seller_result, buyer_result) = tokio::join!(
        seller.submit_range(&negotiation.id, dec("900"), dec("1100")),
        buyer.submit_range(&negotiation.id, dec("800"), dec("1000")),
    );
    let results = [seller_result.unwrap(), buyer_result.unwrap()];

    let evaluated = results
        .iter()
        .filter(|r| matches!(r, SubmissionResult::Evaluated(Outcome::Deal(_))))
        .count();
    let lost_race = results
        .iter()
        .filter(|r| matches!(r, SubmissionResult::AlreadyEvaluated))
        .count();
    assert_eq!((evaluated, lost_race), (1, 1));
    assert_eq!(backend.count(Collection::Deals).await, 1);
    assert_eq!(
        seller.negotiation(&negotiation.id).await.unwrap().status,
        NegotiationStatus::Completed
    );
}

#[tokio::test]
async fn ranges_at_decimal_limit_are_evaluated() {
    let backend = InMemoryBackend::new();
    let seller = engine(&backend, user("sam"));
    let buyer = engine(&backend, user("bea"));

    let negotiation = seller
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();
    seller
        .submit_range(&negotiation.id, Decimal::MAX - Decimal::ONE, Decimal::MAX)
        .await
        .unwrap();
    let result = buyer
        .submit_range(&negotiation.id, Decimal::ONE, Decimal::MAX)
        .await
        .unwrap();

    assert!(matches!(
        result,
        SubmissionResult::Evaluated(Outcome::NoDeal(NoDealReason::FeeExceedsMargin { .. }))
    ));
    assert_eq!(backend.count(Collection::Deals).await, 0);
}

#[tokio::test]
async fn second_range_from_same_user_is_rejected() {
    let backend = InMemoryBackend::new();
    let seller = engine(&backend, user("sam"));

    let negotiation = seller
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();
    seller
        .submit_range(&negotiation.id, dec("900"), dec("1100"))
        .await
        .unwrap();

    let again = seller
        .submit_range(&negotiation.id, dec("800"), dec("1100"))
        .await;
    assert!(matches!(again, Err(BlindPriceError::RangeAlreadySubmitted(_))));
    assert_eq!(backend.count(Collection::PriceRanges).await, 1);
}

#[tokio::test]
async fn outsiders_cannot_submit_or_view() {
    let backend = InMemoryBackend::new();
    let seller = engine(&backend, user("sam"));
    let mallory = engine(&backend, user("mallory"));

    let negotiation = seller
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();

    assert!(matches!(
        mallory
            .submit_range(&negotiation.id, dec("1"), dec("2"))
            .await,
        Err(BlindPriceError::NotParticipant { .. })
    ));
    assert!(matches!(
        mallory.negotiation(&negotiation.id).await,
        Err(BlindPriceError::NotParticipant { .. })
    ));
}

#[tokio::test]
async fn invalid_range_is_not_persisted() {
    let backend = InMemoryBackend::new();
    let seller = engine(&backend, user("sam"));

    let negotiation = seller
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();

    assert!(matches!(
        seller
            .submit_range(&negotiation.id, dec("1100"), dec("900"))
            .await,
        Err(BlindPriceError::InvalidPriceRange(_))
    ));
    assert!(matches!(
        seller.submit_range(&negotiation.id, dec("0"), dec("900")).await,
        Err(BlindPriceError::InvalidPriceRange(_))
    ));
    assert_eq!(backend.count(Collection::PriceRanges).await, 0);
}

#[tokio::test]
async fn stale_negotiations_expire() {
    let backend = InMemoryBackend::new();
    let opened = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let later = opened + Duration::days(31);

    let seller = engine_at(&backend, user("sam"), opened);
    let negotiation = seller
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();

    // Past the deadline but not swept yet
    let late_buyer = engine_at(&backend, user("bea"), later);
    assert!(matches!(
        late_buyer
            .submit_range(&negotiation.id, dec("1"), dec("2"))
            .await,
        Err(BlindPriceError::NegotiationExpired(_))
    ));

    assert_eq!(late_buyer.expire_stale().await.unwrap(), 1);
    assert_eq!(late_buyer.expire_stale().await.unwrap(), 0);
    assert_eq!(
        late_buyer.negotiation(&negotiation.id).await.unwrap().status,
        NegotiationStatus::Expired
    );
    assert!(matches!(
        late_buyer
            .submit_range(&negotiation.id, dec("1"), dec("2"))
            .await,
        Err(BlindPriceError::InvalidStateTransition(_))
    ));
}

#[tokio::test]
async fn dashboard_lists_both_sides_newest_first() {
    let backend = InMemoryBackend::new();
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    let first = engine_at(&backend, user("sam"), t0)
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();
    let second = engine_at(&backend, user("bea"), t0 + Duration::hours(1))
        .create_negotiation(listing(Role::Buyer, "sam"))
        .await
        .unwrap();
    engine_at(&backend, user("carl"), t0 + Duration::hours(2))
        .create_negotiation(listing(Role::Buyer, "dana"))
        .await
        .unwrap();

    let dashboard = engine_at(&backend, user("sam"), t0).dashboard().await.unwrap();
    let ids: Vec<_> = dashboard.iter().map(|n| n.id.clone()).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn attachment_is_uploaded() {
    let backend = InMemoryBackend::new();
    let seller = engine(&backend, user("sam"));

    let negotiation = seller
        .create_negotiation(NewNegotiation {
            attachment: Some(Attachment {
                file_name: "bike.jpg".to_string(),
                bytes: vec![0xff, 0xd8, 0xff],
            }),
            ..listing(Role::Seller, "bea")
        })
        .await
        .unwrap();

    let url = negotiation.attachment_url.expect("url");
    assert_eq!(backend.blob(&url).await.unwrap(), vec![0xff, 0xd8, 0xff]);
}

#[tokio::test]
async fn platform_stats_are_admin_only() {
    let backend = InMemoryBackend::new();
    let seller = engine(&backend, user("sam"));
    let buyer = engine(&backend, user("bea"));
    let admin = engine(
        &backend,
        CurrentUser::new("root", "root@example.com", UserRole::Admin),
    );

    let negotiation = seller
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();
    let cancelled = seller
        .create_negotiation(listing(Role::Seller, "bea"))
        .await
        .unwrap();
    seller.cancel(&cancelled.id).await.unwrap();

    seller
        .submit_range(&negotiation.id, dec("4500"), dec("5200"))
        .await
        .unwrap();
    buyer
        .submit_range(&negotiation.id, dec("4000"), dec("5000"))
        .await
        .unwrap();

    assert!(matches!(
        seller.platform_stats().await,
        Err(BlindPriceError::Unauthorized(_))
    ));

    let stats = admin.platform_stats().await.unwrap();
    assert_eq!(stats.total_negotiations, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.deals, 1);
    assert_eq!(stats.total_volume, dec("4750"));
    // Buyer has no prior negotiations of their own: 1% tier
    assert_eq!(stats.total_fees, dec("47.50"));

    // Admins can read any negotiation
    assert!(admin.deal(&negotiation.id).await.unwrap().is_some());
}
