//! Policy store access
//!
//! The policy lives inside an opaque key/value object owned by an
//! external store. This module defines the store seam ([`ObjectStore`]),
//! two backends, and [`PolicyStoreClient`], which maps between the
//! object's two policy-related fields and a [`PolicyDocument`].
//!
//! Writes are merge-patches: only the `policy` text and the `enabled`
//! flag are touched, every other field on the object is preserved.

use crate::document::PolicyDocument;
use crate::error::{Result, SyncError};
use crate::types::StoreId;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Field of the store object holding the newline-delimited policy lines
pub const POLICY_FIELD: &str = "policy";

/// Field of the store object holding the enforcement flag
pub const ENABLED_FIELD: &str = "enabled";

/// Opaque key/value object store.
///
/// Objects are JSON maps addressed by store id. `merge_patch` performs a
/// shallow top-level merge; it must never destructively replace fields
/// absent from the patch.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object. Absence is not an error.
    async fn get(&self, store_id: &str) -> Result<Option<Value>>;

    /// Merge the patch's top-level fields into the object, creating the
    /// object if it does not exist.
    async fn merge_patch(&self, store_id: &str, patch: Value) -> Result<()>;
}

/// Filesystem-backed object store: one JSON file per store id.
///
/// Writes are staged through a temporary file in the target directory
/// and atomically renamed into place, so a policy of any size never
/// passes through a fixed-size command or argument buffer and readers
/// never observe a half-written object.
pub struct FsObjectStore {
    dir: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn object_path(&self, store_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", store_id))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, store_id: &str) -> Result<Option<Value>> {
        match tokio::fs::read_to_string(self.object_path(store_id)).await {
            Ok(text) => {
                let value = serde_json::from_str(&text).map_err(|e| {
                    SyncError::StoreRead(format!("Malformed store object '{}': {}", store_id, e))
                })?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::StoreRead(format!(
                "Failed to read store object '{}': {}",
                store_id, e
            ))),
        }
    }

    async fn merge_patch(&self, store_id: &str, patch: Value) -> Result<()> {
        // the pre-patch read belongs to the write phase; callers matching
        // on the error variant must see a write failure
        let mut object = self
            .get(store_id)
            .await
            .map_err(|e| SyncError::StoreWrite(format!("Pre-patch read failed: {}", e)))?
            .unwrap_or_else(|| json!({}));
        apply_shallow_merge(&mut object, patch)?;

        let path = self.object_path(store_id);
        let payload = serde_json::to_vec_pretty(&object)
            .map_err(|e| SyncError::Serialization(format!("Failed to encode object: {}", e)))?;

        // Staging must land on the same filesystem as the target for the
        // rename to stay atomic.
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
            staged.write_all(&payload)?;
            staged
                .persist(&path)
                .map_err(|e| SyncError::StoreWrite(format!("Failed to persist object: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| SyncError::StoreWrite(format!("Staging task failed: {}", e)))??;

        Ok(())
    }
}

/// In-memory object store for tests and single-process embedding
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryObjectStore {
    /// Create a new in-memory object store
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed an object directly, bypassing merge semantics (test setup)
    pub async fn put(&self, store_id: &str, object: Value) {
        let mut objects = self.objects.write().await;
        objects.insert(store_id.to_string(), object);
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, store_id: &str) -> Result<Option<Value>> {
        let objects = self.objects.read().await;
        Ok(objects.get(store_id).cloned())
    }

    async fn merge_patch(&self, store_id: &str, patch: Value) -> Result<()> {
        let mut objects = self.objects.write().await;
        let object = objects
            .entry(store_id.to_string())
            .or_insert_with(|| json!({}));
        apply_shallow_merge(object, patch)
    }
}

fn apply_shallow_merge(object: &mut Value, patch: Value) -> Result<()> {
    let target = object.as_object_mut().ok_or_else(|| {
        SyncError::StoreWrite("Store object is not a JSON map".to_string())
    })?;
    let Value::Object(fields) = patch else {
        return Err(SyncError::StoreWrite("Patch is not a JSON map".to_string()));
    };
    for (key, value) in fields {
        target.insert(key, value);
    }
    Ok(())
}

/// Reads and writes the policy portion of a store object
pub struct PolicyStoreClient {
    store: Arc<dyn ObjectStore>,
}

impl PolicyStoreClient {
    /// Create a client over the given backend
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fetch and parse the current policy document.
    ///
    /// An absent object is an empty, disabled document; unrecognized
    /// policy lines are skipped.
    pub async fn read(&self, store_id: &StoreId) -> Result<PolicyDocument> {
        let Some(object) = self.store.get(store_id).await? else {
            debug!("Store object '{}' absent, treating as empty policy", store_id);
            return Ok(PolicyDocument::empty());
        };

        let enabled = object
            .get(ENABLED_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let text = object
            .get(POLICY_FIELD)
            .and_then(Value::as_str)
            .unwrap_or("");

        Ok(PolicyDocument::parse(text, enabled))
    }

    /// Serialize the document and merge-patch it into the store object,
    /// leaving unrelated fields untouched.
    pub async fn write(&self, store_id: &StoreId, doc: &PolicyDocument) -> Result<()> {
        self.write_text(store_id, &doc.to_text()).await
    }

    /// Write previously captured policy text back verbatim
    pub async fn write_text(&self, store_id: &StoreId, text: &str) -> Result<()> {
        let patch = json!({
            (POLICY_FIELD): text,
            (ENABLED_FIELD): true,
        });

        self.store.merge_patch(store_id, patch).await?;
        debug!(
            "Patched store object '{}' ({} policy byte(s))",
            store_id,
            text.len()
        );
        Ok(())
    }
}
