//! Role synchronization orchestration
//!
//! Drives the full pipeline for every public operation:
//!
//! ```text
//! Idle -> Locking -> Reading -> Merging -> Writing -> Releasing -> Propagating -> Done
//!            |          |                     |
//!            v          v                     v
//!          Failed     Failed               Failed    (lock released first)
//! ```
//!
//! Once acquisition succeeds the lock is released on every exit path,
//! including store failures; the propagation wait runs only after a
//! successful write. The document is read fresh inside the critical
//! section each time and never cached across operations.

use crate::document::PolicyDocument;
use crate::error::{Result, SyncError};
use crate::lock::{LockManager, LockStore};
use crate::merge;
use crate::store::{ObjectStore, PolicyStoreClient};
use crate::types::PermissionTuple;
use crate::validate;
use crate::waiter::{PropagationProfile, PropagationWaiter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Role synchronization configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Address of the policy object in the store
    pub store_id: String,

    /// Well-known lock token name, distinct from any store id
    pub lock_id: String,

    /// Wall-clock budget for lock acquisition before the existing token
    /// is presumed stale
    pub lock_timeout: Duration,

    /// Role tag applied by `legacy_overwrite`, whose call signature
    /// predates per-role merging and carries no role of its own
    pub legacy_role: String,

    /// Propagation profile for the post-write delay
    pub profile: PropagationProfile,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_id: "rbac-policy".to_string(),
            lock_id: "rbac-policy-sync".to_string(),
            lock_timeout: Duration::from_secs(60),
            legacy_role: "admin".to_string(),
            profile: PropagationProfile::detect(),
        }
    }
}

/// Assigns permissions to roles and binds users to them, serialized
/// across independent workers by a named exclusive lock
pub struct RoleSyncService {
    config: SyncConfig,
    locks: LockManager,
    client: PolicyStoreClient,
    waiter: PropagationWaiter,
}

impl RoleSyncService {
    /// Create a service over the given lock and object store backends
    pub fn new(
        config: SyncConfig,
        lock_store: Arc<dyn LockStore>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        let waiter = PropagationWaiter::new(config.profile);
        Self {
            locks: LockManager::new(lock_store),
            client: PolicyStoreClient::new(object_store),
            config,
            waiter,
        }
    }

    /// Replace the propagation waiter (tests shrink the delay to zero)
    pub fn with_waiter(mut self, waiter: PropagationWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    /// Assign `permissions` to `role` and bind `user` to it.
    ///
    /// Malformed permission tuples are dropped with a warning before the
    /// lock is taken; the merge replaces the role's previous grant set
    /// and supersedes any prior role binding of the user.
    pub async fn assign_role(
        &self,
        role: &str,
        permissions: &[PermissionTuple],
        user: &str,
    ) -> Result<()> {
        // Normalize at the boundary: stored lines are trimmed on parse,
        // so merge filter keys must be trimmed too or a padded identifier
        // would silently stop matching its own prior binding.
        let role = role.trim();
        let user = user.trim();
        if role.is_empty() {
            return Err(SyncError::InvalidInput("Role name must not be empty".to_string()));
        }
        if user.is_empty() {
            return Err(SyncError::InvalidInput("User name must not be empty".to_string()));
        }

        let permissions = validate::filter_permissions(permissions);
        debug!(
            "Assigning role '{}' to user '{}' with {} permission(s)",
            role,
            user,
            permissions.len()
        );

        let role = role.to_string();
        let user = user.to_string();
        self.write_locked(move |current| merge::assign_role(&current, &role, &permissions, &user))
            .await?;

        info!("Role assignment synchronized to '{}'", self.config.store_id);
        Ok(())
    }

    /// Legacy whole-policy replace mode: the entire grant set becomes
    /// `permissions`, tagged with the configured legacy role. Kept for
    /// single-role deployments that predate per-role merging.
    pub async fn legacy_overwrite(&self, permissions: &[PermissionTuple]) -> Result<()> {
        let permissions = validate::filter_permissions(permissions);
        debug!(
            "Overwriting grant set with {} permission(s) as '{}'",
            permissions.len(),
            self.config.legacy_role
        );

        let role = self.config.legacy_role.clone();
        self.write_locked(move |current| merge::overwrite_grants(&current, &role, &permissions))
            .await?;

        info!("Legacy grant overwrite synchronized to '{}'", self.config.store_id);
        Ok(())
    }

    /// Write a previously captured policy text back verbatim,
    /// lock-protected but without a read/merge step.
    pub async fn restore(&self, saved_policy_text: &str) -> Result<()> {
        let guard = self
            .locks
            .acquire(&self.config.lock_id, self.config.lock_timeout)
            .await?;

        let result = self
            .client
            .write_text(&self.config.store_id, saved_policy_text)
            .await;

        guard.release().await;
        result?;

        self.waiter.wait().await;
        info!("Restored captured policy to '{}'", self.config.store_id);
        Ok(())
    }

    /// Read the current document without taking the lock (inspection
    /// only; mutation decisions must never be based on an unlocked read)
    pub async fn current_document(&self) -> Result<PolicyDocument> {
        self.client.read(&self.config.store_id).await
    }

    /// Run read-merge-write inside the critical section. The guard is
    /// released on every path once acquisition succeeded, and the
    /// propagation wait runs only after a successful write.
    async fn write_locked<F>(&self, transform: F) -> Result<()>
    where
        F: FnOnce(PolicyDocument) -> PolicyDocument,
    {
        let guard = self
            .locks
            .acquire(&self.config.lock_id, self.config.lock_timeout)
            .await?;

        let result = self.read_merge_write(transform).await;

        guard.release().await;
        result?;

        self.waiter.wait().await;
        Ok(())
    }

    async fn read_merge_write<F>(&self, transform: F) -> Result<()>
    where
        F: FnOnce(PolicyDocument) -> PolicyDocument,
    {
        let current = self.client.read(&self.config.store_id).await?;
        debug!("Read {} policy line(s) for merge", current.lines.len());

        let next = transform(current);
        self.client.write(&self.config.store_id, &next).await
    }
}
