//! Core identifier and input types

use serde::{Deserialize, Serialize};

/// Role identifier (opaque, never empty)
pub type RoleId = String;

/// User identifier (opaque, never empty)
pub type UserId = String;

/// Address of the policy object in the external store
pub type StoreId = String;

/// Well-known name of the exclusive lock token, distinct from any store id
pub type LockId = String;

/// A raw `(resource, action, object)` permission as supplied by a caller,
/// prior to validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTuple {
    /// Resource kind being authorized (e.g., "namespaces")
    pub resource: String,

    /// Action verb (read, create, delete, ...)
    pub action: String,

    /// Object pattern the grant applies to (e.g., "*")
    pub object: String,
}

impl PermissionTuple {
    /// Create a new permission tuple
    pub fn new(
        resource: impl Into<String>,
        action: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            object: object.into(),
        }
    }
}

impl From<(&str, &str, &str)> for PermissionTuple {
    fn from((resource, action, object): (&str, &str, &str)) -> Self {
        Self::new(resource, action, object)
    }
}
