//! Permission tuple validation
//!
//! Malformed tuples are dropped before the merge so a single bad call
//! site cannot corrupt the shared policy or abort an otherwise-valid
//! batch. Dropping is a warning-level side effect, never an error.

use crate::types::PermissionTuple;
use tracing::warn;

fn field_ok(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != "undefined"
}

/// Whether every field of the tuple is non-empty after trimming and not
/// literally `"undefined"` (a serialized JavaScript hole, seen in the
/// wild from sloppy call sites).
pub fn is_valid(tuple: &PermissionTuple) -> bool {
    field_ok(&tuple.resource) && field_ok(&tuple.action) && field_ok(&tuple.object)
}

/// Filter a permission batch down to its valid tuples.
///
/// Invalid entries are logged at warn level and removed; the input is
/// not mutated. Surviving tuples come back with their fields trimmed,
/// matching the trimming the line parser applies on read, so stored
/// lines and later merge filter keys always agree.
pub fn filter_permissions(tuples: &[PermissionTuple]) -> Vec<PermissionTuple> {
    let mut valid = Vec::with_capacity(tuples.len());

    for tuple in tuples {
        if is_valid(tuple) {
            valid.push(PermissionTuple::new(
                tuple.resource.trim(),
                tuple.action.trim(),
                tuple.object.trim(),
            ));
        } else {
            warn!(
                "Dropping malformed permission tuple ({:?}, {:?}, {:?})",
                tuple.resource, tuple.action, tuple.object
            );
        }
    }

    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tuple_passes() {
        let tuples = vec![PermissionTuple::new("namespaces", "read", "*")];
        assert_eq!(filter_permissions(&tuples).len(), 1);
    }

    #[test]
    fn test_empty_field_dropped() {
        let tuples = vec![
            PermissionTuple::new("", "read", "*"),
            PermissionTuple::new("namespaces", "read", "*"),
        ];
        let filtered = filter_permissions(&tuples);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].resource, "namespaces");
    }

    #[test]
    fn test_whitespace_only_field_dropped() {
        let tuples = vec![PermissionTuple::new("namespaces", "   ", "*")];
        assert!(filter_permissions(&tuples).is_empty());
    }

    #[test]
    fn test_undefined_literal_dropped() {
        let tuples = vec![PermissionTuple::new("namespaces", "read", "undefined")];
        assert!(filter_permissions(&tuples).is_empty());
    }

    #[test]
    fn test_surviving_tuples_are_trimmed() {
        let tuples = vec![PermissionTuple::new(" namespaces ", "read ", " *")];
        let filtered = filter_permissions(&tuples);
        assert_eq!(filtered[0], PermissionTuple::new("namespaces", "read", "*"));
    }

    #[test]
    fn test_input_not_mutated() {
        let tuples = vec![
            PermissionTuple::new("", "read", "*"),
            PermissionTuple::new("namespaces", "read", "*"),
        ];
        let _ = filter_permissions(&tuples);
        assert_eq!(tuples.len(), 2);
    }
}
