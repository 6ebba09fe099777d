//! Named exclusive lock with stale-token recovery
//!
//! The lock is a single uniquely-named token object whose *existence* is
//! the lock; whoever wins the atomic create-if-absent race holds it.
//! This is the only serialization primitive in the crate: every policy
//! mutation happens between `acquire` and `release`.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity of a lock holder, stored inside the token for diagnostics.
/// Correctness never depends on these fields, only on token existence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockToken {
    /// Unique id of this acquisition attempt
    pub holder_id: String,

    /// Process id of the holder
    pub pid: u32,

    /// When the token was created
    pub acquired_at: DateTime<Utc>,
}

impl LockToken {
    /// Build a token identifying the current process
    pub fn for_current_process() -> Self {
        Self {
            holder_id: Uuid::new_v4().to_string(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }
}

/// Backend holding the lock token.
///
/// The only operations the lock needs are "create if absent", "delete",
/// and "read holder metadata"; anything offering an atomic
/// create-if-not-exists primitive can implement this.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically create the token. Returns `false` if a token already
    /// exists (somebody else holds the lock).
    async fn try_create(&self, lock_id: &str, token: &LockToken) -> Result<bool>;

    /// Delete the token. Deleting an absent token is not an error.
    async fn remove(&self, lock_id: &str) -> Result<()>;

    /// Read the current holder's metadata, if any. Diagnostics only.
    async fn read(&self, lock_id: &str) -> Result<Option<LockToken>>;
}

/// Lock token as a file; `O_CREAT|O_EXCL` is the create-if-absent race
pub struct FsLockStore {
    dir: PathBuf,
}

impl FsLockStore {
    /// Create a lock store rooted at `dir` (one token file per lock id)
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn token_path(&self, lock_id: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", lock_id))
    }
}

#[async_trait]
impl LockStore for FsLockStore {
    async fn try_create(&self, lock_id: &str, token: &LockToken) -> Result<bool> {
        let payload = serde_json::to_vec(token)
            .map_err(|e| SyncError::Serialization(format!("Failed to encode lock token: {}", e)))?;

        let open = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.token_path(lock_id))
            .await;

        match open {
            Ok(mut file) => {
                file.write_all(&payload).await?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, lock_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.token_path(lock_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, lock_id: &str) -> Result<Option<LockToken>> {
        match tokio::fs::read_to_string(self.token_path(lock_id)).await {
            Ok(text) => Ok(serde_json::from_str(&text).ok()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory lock store for tests and single-process embedding
pub struct InMemoryLockStore {
    tokens: Arc<RwLock<HashMap<String, LockToken>>>,
}

impl InMemoryLockStore {
    /// Create a new in-memory lock store
    pub fn new() -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn try_create(&self, lock_id: &str, token: &LockToken) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(lock_id) {
            return Ok(false);
        }
        tokens.insert(lock_id.to_string(), token.clone());
        Ok(true)
    }

    async fn remove(&self, lock_id: &str) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        tokens.remove(lock_id);
        Ok(())
    }

    async fn read(&self, lock_id: &str) -> Result<Option<LockToken>> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(lock_id).cloned())
    }
}

/// Backoff bounds for contended acquisition
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Lower bound of the uniform retry jitter
    pub backoff_min: Duration,

    /// Upper bound of the uniform retry jitter
    pub backoff_max: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backoff_min: Duration::from_millis(100),
            backoff_max: Duration::from_millis(200),
        }
    }
}

/// Handle proving the lock is held. Must be released explicitly;
/// `RoleSyncService` guarantees release on every exit path.
pub struct LockGuard {
    store: Arc<dyn LockStore>,
    lock_id: String,
    /// The token this guard created
    pub token: LockToken,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock_id", &self.lock_id)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl LockGuard {
    /// Delete the token. Best-effort: a failed or redundant delete is
    /// logged and swallowed, since the next acquirer's create-if-absent
    /// race does not care why the token is gone.
    pub async fn release(self) {
        if let Err(e) = self.store.remove(&self.lock_id).await {
            warn!("Ignoring lock release failure for '{}': {}", self.lock_id, e);
        } else {
            debug!("Released lock '{}'", self.lock_id);
        }
    }
}

/// Acquires and releases named exclusive locks against a [`LockStore`]
pub struct LockManager {
    store: Arc<dyn LockStore>,
    config: LockConfig,
}

impl LockManager {
    /// Create a manager with default backoff bounds
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self::with_config(store, LockConfig::default())
    }

    /// Create a manager with explicit backoff bounds
    pub fn with_config(store: Arc<dyn LockStore>, config: LockConfig) -> Self {
        Self { store, config }
    }

    /// Acquire the named lock, waiting up to `timeout` wall-clock time.
    ///
    /// Contended attempts retry after a uniform random backoff. Once the
    /// timeout is exceeded the existing token is presumed abandoned by a
    /// crashed holder: it is force-removed and exactly one more create is
    /// attempted. If that attempt also loses the race, the call fails
    /// with [`SyncError::LockTimeout`].
    pub async fn acquire(&self, lock_id: &str, timeout: Duration) -> Result<LockGuard> {
        let token = LockToken::for_current_process();
        let started = Instant::now();

        loop {
            if self.store.try_create(lock_id, &token).await? {
                debug!("Acquired lock '{}' as {}", lock_id, token.holder_id);
                return Ok(self.guard(lock_id, token.clone()));
            }

            if started.elapsed() >= timeout {
                match self.store.read(lock_id).await {
                    Ok(Some(holder)) => warn!(
                        "Force-removing stale lock '{}' held by {} (pid {}) since {}",
                        lock_id, holder.holder_id, holder.pid, holder.acquired_at
                    ),
                    _ => warn!("Force-removing stale lock '{}' (holder unreadable)", lock_id),
                }

                if let Err(e) = self.store.remove(lock_id).await {
                    warn!("Stale lock removal failed for '{}': {}", lock_id, e);
                }

                if self.store.try_create(lock_id, &token).await? {
                    debug!("Acquired lock '{}' after stale removal", lock_id);
                    return Ok(self.guard(lock_id, token.clone()));
                }

                return Err(SyncError::LockTimeout {
                    lock_id: lock_id.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            let backoff = {
                let mut rng = rand::thread_rng();
                rng.gen_range(self.config.backoff_min.as_millis()..=self.config.backoff_max.as_millis())
                    as u64
            };
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
    }

    fn guard(&self, lock_id: &str, token: LockToken) -> LockGuard {
        LockGuard {
            store: Arc::clone(&self.store),
            lock_id: lock_id.to_string(),
            token,
        }
    }
}
