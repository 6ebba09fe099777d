//! Policy merge rules
//!
//! Pure functions from the current document to the next one. Both merge
//! modes keep everything they do not explicitly own: `assign_role`
//! replaces one role's grant block plus one user's binding,
//! `overwrite_grants` replaces the whole grant set but keeps bindings.

use crate::document::{PolicyDocument, PolicyLine};
use crate::types::PermissionTuple;

/// Merge a role assignment into the current document.
///
/// The target role's grant set is fully replaced by `permissions` (never
/// appended to), so re-applying the same call is idempotent. Any prior
/// binding of `user` is removed regardless of which role it pointed to:
/// a user is bound to exactly one role at a time, and re-assigning always
/// supersedes the previous binding.
///
/// An empty `permissions` slice is legitimate and produces a no-access
/// role; the user binding is still recorded.
pub fn assign_role(
    current: &PolicyDocument,
    role: &str,
    permissions: &[PermissionTuple],
    user: &str,
) -> PolicyDocument {
    let mut lines: Vec<PolicyLine> = current
        .lines
        .iter()
        .filter(|line| !line.is_grant_for(role) && !line.is_assignment_for(user))
        .cloned()
        .collect();

    lines.push(PolicyLine::Assignment {
        user: user.to_string(),
        role: role.to_string(),
    });

    for perm in permissions {
        lines.push(PolicyLine::Grant {
            role: role.to_string(),
            resource: perm.resource.clone(),
            action: perm.action.clone(),
            object: perm.object.clone(),
        });
    }

    PolicyDocument {
        lines,
        enabled: current.enabled,
    }
}

/// Legacy whole-policy replace mode: discard every grant line and install
/// the given set, tagged with `role`. Role assignments survive untouched.
pub fn overwrite_grants(
    current: &PolicyDocument,
    role: &str,
    permissions: &[PermissionTuple],
) -> PolicyDocument {
    let mut lines: Vec<PolicyLine> = current
        .lines
        .iter()
        .filter(|line| matches!(line, PolicyLine::Assignment { .. }))
        .cloned()
        .collect();

    for perm in permissions {
        lines.push(PolicyLine::Grant {
            role: role.to_string(),
            resource: perm.resource.clone(),
            action: perm.action.clone(),
            object: perm.object.clone(),
        });
    }

    PolicyDocument {
        lines,
        enabled: current.enabled,
    }
}
