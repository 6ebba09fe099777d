//! End-to-end merge semantics over in-memory backends

use rbac_sync::{
    InMemoryLockStore, InMemoryObjectStore, ObjectStore, PermissionTuple, PolicyLine,
    PropagationProfile, PropagationWaiter, RoleSyncService, SyncConfig, SyncError,
};
use std::sync::Arc;
use std::time::Duration;

fn test_service() -> (RoleSyncService, Arc<InMemoryObjectStore>) {
    let objects = Arc::new(InMemoryObjectStore::new());
    let service = RoleSyncService::new(
        SyncConfig::default(),
        Arc::new(InMemoryLockStore::new()),
        Arc::clone(&objects) as Arc<dyn ObjectStore>,
    )
    .with_waiter(PropagationWaiter::with_delays(
        PropagationProfile::Local,
        Duration::ZERO,
        Duration::ZERO,
    ));
    (service, objects)
}

#[tokio::test]
async fn test_assign_role_from_empty_store() {
    let (service, _) = test_service();

    service
        .assign_role(
            "operator",
            &[PermissionTuple::new("namespaces", "read", "*")],
            "alice",
        )
        .await
        .unwrap();

    let doc = service.current_document().await.unwrap();
    assert!(doc.enabled);
    assert_eq!(doc.grants_for("operator").len(), 1);
    assert_eq!(
        doc.assignments_for("alice")[0].to_line(),
        "g,alice,operator"
    );
}

#[tokio::test]
async fn test_single_role_per_user() {
    let (service, _) = test_service();

    service
        .assign_role(
            "role-a",
            &[PermissionTuple::new("namespaces", "read", "*")],
            "alice",
        )
        .await
        .unwrap();
    service
        .assign_role(
            "role-b",
            &[PermissionTuple::new("backups", "create", "*")],
            "alice",
        )
        .await
        .unwrap();

    let doc = service.current_document().await.unwrap();
    let bindings = doc.assignments_for("alice");
    assert_eq!(bindings.len(), 1, "Exactly one binding may remain");
    assert_eq!(bindings[0].to_line(), "g,alice,role-b");
}

#[tokio::test]
async fn test_padded_identifiers_keep_single_role_per_user() {
    let (service, _) = test_service();

    service
        .assign_role(
            " role-a ",
            &[PermissionTuple::new("ns", "read", "*")],
            " alice ",
        )
        .await
        .unwrap();
    service
        .assign_role(
            " role-b ",
            &[PermissionTuple::new("bk", "read", "*")],
            " alice ",
        )
        .await
        .unwrap();

    // stored lines are trimmed, so the padded keys must still match the
    // binding written by the first call
    let doc = service.current_document().await.unwrap();
    let bindings = doc.assignments_for("alice");
    assert_eq!(bindings.len(), 1, "single-role-per-user violated: {:?}", doc.to_text());
    assert_eq!(bindings[0].to_line(), "g,alice,role-b");
}

#[tokio::test]
async fn test_padded_role_replacement_stays_idempotent() {
    let (service, _) = test_service();
    let perms = vec![PermissionTuple::new("namespaces", "read", "*")];

    service.assign_role(" role-a ", &perms, "alice").await.unwrap();
    service.assign_role("role-a", &perms, "alice").await.unwrap();

    let doc = service.current_document().await.unwrap();
    assert_eq!(doc.grants_for("role-a").len(), 1);
}

#[tokio::test]
async fn test_idempotent_role_replacement() {
    let (service, _) = test_service();
    let perms = vec![
        PermissionTuple::new("namespaces", "read", "*"),
        PermissionTuple::new("backups", "create", "*"),
    ];

    service.assign_role("role-a", &perms, "alice").await.unwrap();
    service.assign_role("role-a", &perms, "alice").await.unwrap();

    let doc = service.current_document().await.unwrap();
    assert_eq!(doc.grants_for("role-a").len(), perms.len());
    assert_eq!(doc.assignments_for("alice").len(), 1);
}

#[tokio::test]
async fn test_malformed_tuples_are_dropped_not_fatal() {
    let (service, _) = test_service();

    service
        .assign_role(
            "role-a",
            &[
                PermissionTuple::new("", "read", "*"),
                PermissionTuple::new("ns", "read", "*"),
                PermissionTuple::new("backups", "undefined", "*"),
            ],
            "bob",
        )
        .await
        .unwrap();

    let doc = service.current_document().await.unwrap();
    let grants = doc.grants_for("role-a");
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].to_line(), "p,role-a,ns,read,*");
}

#[tokio::test]
async fn test_empty_permissions_still_binds_user() {
    let (service, _) = test_service();

    service.assign_role("no-access", &[], "dave").await.unwrap();

    let doc = service.current_document().await.unwrap();
    assert!(doc.grants_for("no-access").is_empty());
    assert_eq!(doc.assignments_for("dave").len(), 1);
}

#[tokio::test]
async fn test_empty_identifiers_rejected_before_locking() {
    let (service, _) = test_service();

    let err = service.assign_role("", &[], "alice").await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidInput(_)));

    let err = service.assign_role("role-a", &[], "  ").await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidInput(_)));
}

#[tokio::test]
async fn test_legacy_overwrite_replaces_grant_set() {
    let (service, _) = test_service();

    service
        .assign_role(
            "role-a",
            &[PermissionTuple::new("namespaces", "delete", "*")],
            "alice",
        )
        .await
        .unwrap();
    service
        .legacy_overwrite(&[PermissionTuple::new("namespaces", "read", "*")])
        .await
        .unwrap();

    let doc = service.current_document().await.unwrap();
    let grants: Vec<_> = doc
        .lines
        .iter()
        .filter(|l| matches!(l, PolicyLine::Grant { .. }))
        .collect();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].to_line(), "p,admin,namespaces,read,*");
    // bindings survive the grant overwrite
    assert_eq!(doc.assignments_for("alice").len(), 1);
}

#[tokio::test]
async fn test_restore_writes_captured_text_verbatim() {
    let (service, _) = test_service();

    service
        .assign_role(
            "role-a",
            &[PermissionTuple::new("namespaces", "read", "*")],
            "alice",
        )
        .await
        .unwrap();
    let captured = service.current_document().await.unwrap().to_text();

    service
        .legacy_overwrite(&[PermissionTuple::new("backups", "create", "*")])
        .await
        .unwrap();
    service.restore(&captured).await.unwrap();

    let doc = service.current_document().await.unwrap();
    assert_eq!(doc.to_text(), captured);
    assert!(doc.enabled);
}

#[tokio::test]
async fn test_manually_edited_lines_survive_read() {
    let (service, objects) = test_service();

    objects
        .put(
            "rbac-policy",
            serde_json::json!({
                "policy": "# audit note\np,viewer,namespaces,read,*",
                "enabled": true,
            }),
        )
        .await;

    service
        .assign_role(
            "role-a",
            &[PermissionTuple::new("backups", "create", "*")],
            "alice",
        )
        .await
        .unwrap();

    // the comment line is skipped on read, the valid grant survives
    let doc = service.current_document().await.unwrap();
    assert_eq!(doc.grants_for("viewer").len(), 1);
    assert_eq!(doc.grants_for("role-a").len(), 1);
}
