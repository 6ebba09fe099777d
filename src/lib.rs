//! # RBAC policy synchronization
//!
//! Safely mutates a shared, textual authorization policy (a Casbin-style
//! `p,role,resource,action,object` / `g,user,role` line list) under
//! concurrent access from independent workers.
//!
//! ## Features
//!
//! - **Exclusive named lock** with randomized backoff and stale-token
//!   recovery; the lock is the only serialization primitive
//! - **Role-scoped merging**: a role's grant set is replaced, never
//!   appended to, so re-applying an assignment is idempotent
//! - **Single-role-per-user invariant**: re-assigning a user always
//!   supersedes the previous binding
//! - **Merge-patch writes** touching only the policy fields of the store
//!   object; unrelated fields are preserved
//! - **Bounded propagation waiting** for polling policy consumers
//!
//! ## Example
//!
//! ```rust
//! use rbac_sync::{
//!     InMemoryLockStore, InMemoryObjectStore, PermissionTuple, PropagationProfile,
//!     PropagationWaiter, RoleSyncService, SyncConfig,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RoleSyncService::new(
//!         SyncConfig::default(),
//!         Arc::new(InMemoryLockStore::new()),
//!         Arc::new(InMemoryObjectStore::new()),
//!     )
//!     .with_waiter(PropagationWaiter::with_delays(
//!         PropagationProfile::Local,
//!         Duration::ZERO,
//!         Duration::ZERO,
//!     ));
//!
//!     service
//!         .assign_role(
//!             "operator",
//!             &[PermissionTuple::new("namespaces", "read", "*")],
//!             "alice",
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod document;
pub mod error;
pub mod lock;
pub mod merge;
pub mod service;
pub mod store;
pub mod types;
pub mod validate;
pub mod waiter;

// Re-export commonly used types
pub use document::{PolicyDocument, PolicyLine};
pub use error::{Result, SyncError};
pub use lock::{FsLockStore, InMemoryLockStore, LockConfig, LockGuard, LockManager, LockStore, LockToken};
pub use service::{RoleSyncService, SyncConfig};
pub use store::{FsObjectStore, InMemoryObjectStore, ObjectStore, PolicyStoreClient};
pub use types::{LockId, PermissionTuple, RoleId, StoreId, UserId};
pub use waiter::{PropagationProfile, PropagationWaiter};
