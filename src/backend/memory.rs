//! In-memory backend used by the CLI demo and tests

use crate::error::{BlindPriceError, Result};
use crate::types::CurrentUser;
use async_trait::async_trait;
use blake2::{Blake2b512, Digest};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{Backend, Collection, Document, Filter};

/// Public URL prefix for uploaded blobs
pub const DEFAULT_BLOB_BASE_URL: &str = "memory://blobs";

/// Data shared by every session of one backend
struct SharedState {
    collections: Mutex<HashMap<Collection, BTreeMap<String, Document>>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    unique: HashMap<Collection, Vec<Vec<&'static str>>>,
    blob_base_url: String,
}

/// Datastore, auth and blob storage kept in process memory.
///
/// Clones share data and session. `session_for` shares data but gives the
/// new handle its own signed-in user, the way two browsers talk to the same
/// hosted project.
#[derive(Clone)]
pub struct InMemoryBackend {
    shared: Arc<SharedState>,
    session: Arc<Mutex<Option<CurrentUser>>>,
}

impl InMemoryBackend {
    /// Create a backend with one range per participant and one deal per
    /// negotiation enforced
    pub fn new() -> Self {
        Self::with_blob_base_url(DEFAULT_BLOB_BASE_URL)
    }

    pub fn with_blob_base_url(base_url: impl Into<String>) -> Self {
        let mut unique = HashMap::new();
        unique.insert(
            Collection::PriceRanges,
            vec![vec!["negotiation_id", "user_id"]],
        );
        unique.insert(Collection::Deals, vec![vec!["negotiation_id"]]);

        Self {
            shared: Arc::new(SharedState {
                collections: Mutex::new(HashMap::new()),
                blobs: Mutex::new(HashMap::new()),
                unique,
                blob_base_url: base_url.into().trim_end_matches('/').to_string(),
            }),
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// A handle on the same data with `user` signed in
    pub fn session_for(&self, user: CurrentUser) -> Self {
        Self {
            shared: self.shared.clone(),
            session: Arc::new(Mutex::new(Some(user))),
        }
    }

    pub async fn sign_in(&self, user: CurrentUser) {
        *self.session.lock().await = Some(user);
    }

    pub async fn sign_out(&self) {
        *self.session.lock().await = None;
    }

    /// Bytes stored under a public URL
    pub async fn blob(&self, url: &str) -> Option<Vec<u8>> {
        self.shared.blobs.lock().await.get(url).cloned()
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: Collection) -> usize {
        self.shared
            .collections
            .lock()
            .await
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    fn constraint_key(fields: &[&str], document: &Document) -> Option<String> {
        let parts = fields
            .iter()
            .map(|field| document.get(*field).map(|value| format!("{}={}", field, value)))
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join(","))
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, collection: Collection, id: &str, document: Document) -> Result<()> {
        let mut collections = self.shared.collections.lock().await;
        let documents = collections.entry(collection).or_default();

        if documents.contains_key(id) {
            return Err(BlindPriceError::DuplicateRecord {
                collection: collection.to_string(),
                key: format!("id={}", id),
            });
        }

        for fields in self.shared.unique.get(&collection).into_iter().flatten() {
            // Documents missing a constrained field are not constrained
            let Some(key) = Self::constraint_key(fields, &document) else {
                continue;
            };
            let taken = documents
                .values()
                .any(|existing| Self::constraint_key(fields, existing).as_deref() == Some(key.as_str()));
            if taken {
                return Err(BlindPriceError::DuplicateRecord {
                    collection: collection.to_string(),
                    key,
                });
            }
        }

        documents.insert(id.to_string(), document);
        tracing::debug!("Created {}/{}", collection, id);
        Ok(())
    }

    async fn list(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
        let collections = self.shared.collections.lock().await;
        Ok(collections
            .get(&collection)
            .map(|documents| {
                documents
                    .values()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<()> {
        let mut collections = self.shared.collections.lock().await;
        let document = collections
            .get_mut(&collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| BlindPriceError::RecordNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (field, value) in patch {
            document.insert(field, value);
        }
        tracing::debug!("Updated {}/{}", collection, id);
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<CurrentUser>> {
        Ok(self.session.lock().await.clone())
    }

    async fn upload_blob(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        if file_name.is_empty() || file_name.contains('/') {
            return Err(BlindPriceError::BlobUpload(format!(
                "invalid file name '{}'",
                file_name
            )));
        }

        let digest = Blake2b512::digest(&bytes);
        let url = format!(
            "{}/{}/{}",
            self.shared.blob_base_url,
            hex::encode(&digest[..16]),
            file_name
        );

        self.shared.blobs.lock().await.insert(url.clone(), bytes);
        tracing::debug!("Uploaded blob {}", url);
        Ok(url)
    }
}
