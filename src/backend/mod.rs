//! Hosted backend capability: documents, auth and blob storage
//!
//! Everything that talks to the datastore receives a `Backend` explicitly.
//! Documents are untyped JSON objects here; `store` maps them onto the typed
//! records and validates them on the way in.

pub mod memory;
pub mod store;

pub use memory::InMemoryBackend;
pub use store::{Record, Store};

use crate::error::Result;
use crate::types::CurrentUser;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// A stored JSON object
pub type Document = serde_json::Map<String, Value>;

/// Named collections
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Negotiations,
    PriceRanges,
    Deals,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Negotiations => "negotiations",
            Collection::PriceRanges => "price_ranges",
            Collection::Deals => "deals",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality filter over top-level document fields. An empty filter matches
/// every document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }
}

/// Capability interface over the hosted backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name for logs
    fn backend_tag(&self) -> &'static str;

    /// Insert a document. Fails with `DuplicateRecord` if the ID exists or a
    /// uniqueness constraint of the collection would be violated.
    async fn create(&self, collection: Collection, id: &str, document: Document) -> Result<()>;

    /// Documents matching the filter
    async fn list(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>>;

    /// Shallow-merge `patch` into an existing document
    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<()>;

    /// The signed-in user, if any
    async fn current_user(&self) -> Result<Option<CurrentUser>>;

    /// Store a file and return its public URL
    async fn upload_blob(&self, file_name: &str, bytes: Vec<u8>) -> Result<String>;
}
