//! Typed records on top of the document backend

use crate::error::{BlindPriceError, Result};
use crate::negotiation::{Deal, Negotiation, PriceRange};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::{Backend, Collection, Document, Filter};

/// A typed entity living in one collection
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn record_id(&self) -> &str;

    /// Invariants checked whenever a record enters from the datastore
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

impl Record for Negotiation {
    const COLLECTION: Collection = Collection::Negotiations;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn check(&self) -> Result<()> {
        if self.initiator_id == self.counterparty_id {
            return Err(BlindPriceError::InvalidInput(format!(
                "negotiation {} has the same user on both sides",
                self.id
            )));
        }
        Ok(())
    }
}

impl Record for PriceRange {
    const COLLECTION: Collection = Collection::PriceRanges;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn check(&self) -> Result<()> {
        self.validate()
    }
}

impl Record for Deal {
    const COLLECTION: Collection = Collection::Deals;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn check(&self) -> Result<()> {
        if self.final_price != self.agreed_price - self.platform_fee {
            return Err(BlindPriceError::InvalidInput(format!(
                "deal {} final price {} != {} - {}",
                self.id, self.final_price, self.agreed_price, self.platform_fee
            )));
        }
        if self.platform_fee < Decimal::ZERO {
            return Err(BlindPriceError::InvalidInput(format!(
                "deal {} has negative fee {}",
                self.id, self.platform_fee
            )));
        }
        Ok(())
    }
}

/// Typed access to a backend
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Persist a new record
    pub async fn insert<R: Record>(&self, record: &R) -> Result<()> {
        let document = to_document(record)?;
        self.backend
            .create(R::COLLECTION, record.record_id(), document)
            .await
    }

    /// Records matching the filter. A malformed document fails the whole call.
    pub async fn find<R: Record>(&self, filter: &Filter) -> Result<Vec<R>> {
        self.backend
            .list(R::COLLECTION, filter)
            .await?
            .into_iter()
            .map(from_document::<R>)
            .collect()
    }

    /// Record by ID
    pub async fn get<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let mut found = self.find::<R>(&Filter::all().eq("id", id)).await?;
        Ok(found.pop())
    }

    /// Overwrite selected fields of a record
    pub async fn update<R: Record>(&self, id: &str, patch: Value) -> Result<()> {
        let Value::Object(patch) = patch else {
            return Err(BlindPriceError::InvalidRecord {
                collection: R::COLLECTION.to_string(),
                reason: "patch is not an object".to_string(),
            });
        };
        self.backend.update(R::COLLECTION, id, patch).await
    }
}

fn to_document<R: Record>(record: &R) -> Result<Document> {
    match serde_json::to_value(record)? {
        Value::Object(document) => Ok(document),
        other => Err(BlindPriceError::InvalidRecord {
            collection: R::COLLECTION.to_string(),
            reason: format!("serialized to {} instead of an object", other),
        }),
    }
}

fn from_document<R: Record>(document: Document) -> Result<R> {
    let invalid = |reason: String| BlindPriceError::InvalidRecord {
        collection: R::COLLECTION.to_string(),
        reason,
    };

    let record: R =
        serde_json::from_value(Value::Object(document)).map_err(|e| invalid(e.to_string()))?;
    record.check().map_err(|e| invalid(e.to_string()))?;
    Ok(record)
}
