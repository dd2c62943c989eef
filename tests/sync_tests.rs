//! # Membership Sync Tests
//!
//! Per-role transaction behaviour: idempotence, statement order, rollback.

mod common;

use common::{set, Fail, FakeCatalog, Harness};
use db_role_manager::database::sql;
use db_role_manager::reconciler::{sync_role, OperationKind};
use db_role_manager::Role;

fn catalog() -> FakeCatalog {
    FakeCatalog::new()
        .with_group("demos_read")
        .with_group("demos_write")
        .with_group("demos_delete")
        .with_login_role("app_user", &["demos_read", "demos_write"])
}

#[tokio::test]
async fn test_sync_revokes_then_grants_in_one_transaction() {
    let catalog = catalog();
    let role = Role::new("app_user", ["demos_read", "demos_delete"]);

    let outcome = sync_role(&catalog, &role).await;

    assert!(outcome.is_success(), "sync failed: {:?}", outcome.error);
    assert_eq!(outcome.kind, OperationKind::SyncMemberships);
    assert_eq!(
        catalog.statements(),
        vec![
            "BEGIN".to_string(),
            "SELECT memberships of app_user".to_string(),
            sql::revoke(&["demos_write"], "app_user"),
            sql::grant(&["demos_delete"], "app_user"),
            "COMMIT".to_string(),
        ]
    );
    assert_eq!(catalog.memberships("app_user"), set(&["demos_read", "demos_delete"]));
}

#[tokio::test]
async fn test_sync_twice_is_idempotent() {
    let catalog = catalog();
    let role = Role::new("app_user", ["demos_delete"]);

    assert!(sync_role(&catalog, &role).await.is_success());
    catalog.clear_statements();
    assert!(sync_role(&catalog, &role).await.is_success());

    let statements = catalog.statements();
    assert!(
        !statements.iter().any(|s| s.starts_with("GRANT") || s.starts_with("REVOKE")),
        "second sync must not change anything: {statements:?}"
    );
    assert_eq!(statements, vec!["BEGIN", "SELECT memberships of app_user", "COMMIT"]);
}

#[tokio::test]
async fn test_revoke_failure_rolls_back() {
    let catalog = catalog();
    catalog.fail_on(Fail::Revoke("app_user".to_string()));
    let before = catalog.memberships("app_user");
    let role = Role::new("app_user", ["demos_read", "demos_delete"]);

    let outcome = sync_role(&catalog, &role).await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.target, "app_user");
    let statements = catalog.statements();
    assert_eq!(statements.last().map(String::as_str), Some("ROLLBACK"));
    assert!(!statements.iter().any(|s| s == "COMMIT"));
    assert!(
        !statements.iter().any(|s| s.starts_with("GRANT")),
        "nothing runs after the failed statement"
    );
    assert_eq!(catalog.memberships("app_user"), before, "memberships must be unchanged");
}

#[tokio::test]
async fn test_grant_failure_discards_earlier_revoke() {
    let catalog = catalog();
    catalog.fail_on(Fail::Grant("app_user".to_string()));
    let role = Role::new("app_user", ["demos_delete"]);

    let outcome = sync_role(&catalog, &role).await;

    assert!(!outcome.is_success());
    assert!(catalog.statements().contains(&sql::revoke(&["demos_read", "demos_write"], "app_user")));
    assert_eq!(catalog.memberships("app_user"), set(&["demos_read", "demos_write"]));
}

#[tokio::test]
async fn test_begin_failure_is_reported() {
    let catalog = catalog();
    catalog.fail_on(Fail::Begin);

    let outcome = sync_role(&catalog, &Role::new("app_user", ["demos_read"])).await;

    assert!(!outcome.is_success());
    assert!(outcome.error.as_deref().unwrap_or_default().contains("BEGIN"));
    assert!(catalog.statements().is_empty());
}

#[tokio::test]
async fn test_one_failed_sync_does_not_stop_the_batch() {
    let h = Harness::new(catalog().with_login_role("report_reader", &[]));
    h.catalog.fail_on(Fail::Grant("app_user".to_string()));
    let desired = vec![
        Role::new("app_user", ["demos_read", "demos_write", "demos_delete"]),
        Role::new("report_reader", ["demos_read"]),
    ];

    let report = h.reconciler.apply_role_changes(&desired, None).await.unwrap();

    assert_eq!(report.synced_roles, vec!["report_reader"]);
    let failed: Vec<_> = report
        .failures()
        .map(|o| (o.kind, o.target.as_str()))
        .collect();
    assert_eq!(failed, vec![(OperationKind::SyncMemberships, "app_user")]);
    assert_eq!(h.catalog.memberships("report_reader"), set(&["demos_read"]));
    assert_eq!(h.catalog.memberships("app_user"), set(&["demos_read", "demos_write"]));
}

#[tokio::test]
async fn test_every_role_gets_its_own_transaction() {
    let h = Harness::new(catalog().with_login_role("report_reader", &[]));
    let desired = vec![
        Role::new("app_user", ["demos_read"]),
        Role::new("report_reader", ["demos_read"]),
    ];

    h.reconciler.apply_role_changes(&desired, None).await.unwrap();

    let statements = h.catalog.statements();
    assert_eq!(statements.iter().filter(|s| *s == "BEGIN").count(), 2);
    assert_eq!(statements.iter().filter(|s| *s == "COMMIT").count(), 2);
}
