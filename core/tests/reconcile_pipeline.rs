use std::fs;
use std::path::Path;

use privreset_core::{
    Grantee, InMemoryCatalog, NEW_GRANTS_ARTIFACT, OWNERSHIPS_ARTIFACT, ObjectKind, REVOKES_ARTIFACT, Reconciler,
    Settings, Statement, WorkerPool, parse_artifact, run_many,
};

const OWNERSHIP: &str = "OWNERSHIP";

fn make_settings(objects: &[ObjectKind], output: &Path) -> Settings {
    let mut settings = Settings::new("C", objects.to_vec());
    settings.output_directory = output.to_path_buf();
    settings
}

fn rendered(statements: &[Statement]) -> Vec<String> {
    statements.iter().map(ToString::to_string).collect()
}

fn read_artifact(dir: &Path, name: &str) -> Vec<String> {
    let text = fs::read_to_string(dir.join(name)).expect("artifact exists");
    rendered(&parse_artifact(&text).expect("artifact parses"))
}

fn held_by(catalog: &InMemoryCatalog, target: &str, role: &str) -> bool {
    catalog
        .grants_on(target)
        .expect("grants")
        .iter()
        .any(|(_, grantee)| grantee.name() == role)
}

/// One schema with one table: SELECT to A and ownership held by B.
fn scenario_catalog() -> InMemoryCatalog {
    InMemoryCatalog::default()
        .with_database("D")
        .with_schema("D", "S")
        .with_object(ObjectKind::Table, "D", "S", "T")
        .with_grant(ObjectKind::Table, "D.S.T", "SELECT", Grantee::role("A"))
        .with_grant(ObjectKind::Table, "D.S.T", OWNERSHIP, Grantee::role("B"))
}

/// A wider account: routines, future grants, shared and system databases.
fn account_catalog() -> InMemoryCatalog {
    InMemoryCatalog::default()
        .with_database("D")
        .with_database("E")
        .with_database("SNOWFLAKE")
        .with_shared_database("PARTNER")
        .with_schema("D", "S")
        .with_schema("D", "INFORMATION_SCHEMA")
        .with_schema("E", "RAW")
        .with_object(ObjectKind::Table, "D", "S", "T")
        .with_object(ObjectKind::View, "D", "S", "V")
        .with_object(ObjectKind::Table, "E", "RAW", "EVENTS")
        .with_object(ObjectKind::View, "D", "INFORMATION_SCHEMA", "TABLES")
        .with_routine(ObjectKind::Procedure, "D", "S", "P", "P(FLOAT, VARCHAR) RETURN VARCHAR")
        .with_routine(ObjectKind::Procedure, "D", "S", "P", "P() RETURN VARCHAR")
        .with_builtin_routine(ObjectKind::Function, "", "", "ABS", "ABS(NUMBER) RETURN NUMBER")
        .with_grant(ObjectKind::Database, "D", OWNERSHIP, Grantee::role("SYSADMIN"))
        .with_grant(ObjectKind::Database, "D", "USAGE", Grantee::role("ANALYST"))
        .with_grant(ObjectKind::Schema, "D.S", OWNERSHIP, Grantee::role("SYSADMIN"))
        .with_grant(ObjectKind::Schema, "D.S", "USAGE", Grantee::role("ANALYST"))
        .with_grant(ObjectKind::Table, "D.S.T", "SELECT", Grantee::role("ANALYST"))
        .with_grant(ObjectKind::Table, "D.S.T", "INSERT", Grantee::role("LOADER"))
        .with_grant(ObjectKind::Table, "D.S.T", OWNERSHIP, Grantee::role("LOADER"))
        .with_grant(ObjectKind::View, "D.S.V", OWNERSHIP, Grantee::role("C"))
        .with_grant(ObjectKind::Procedure, "D.S.P(FLOAT, VARCHAR)", "USAGE", Grantee::role("ANALYST"))
        .with_grant(ObjectKind::Procedure, "D.S.P(FLOAT, VARCHAR)", OWNERSHIP, Grantee::role("DEV"))
        .with_grant(ObjectKind::Procedure, "D.S.P()", OWNERSHIP, Grantee::role("DEV"))
        .with_grant(ObjectKind::Table, "E.RAW.EVENTS", OWNERSHIP, Grantee::role("LOADER"))
        .with_future_grant(ObjectKind::Schema, "D.S", ObjectKind::Table, "SELECT", Grantee::role("ANALYST"))
        .with_future_grant(ObjectKind::Database, "D", ObjectKind::View, "SELECT", Grantee::role("ANALYST"))
}

const ACCOUNT_KINDS: [ObjectKind; 5] = [
    ObjectKind::Database,
    ObjectKind::Schema,
    ObjectKind::Table,
    ObjectKind::View,
    ObjectKind::Procedure,
];

#[tokio::test]
async fn converges_single_table_scenario() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = scenario_catalog();
    let settings = make_settings(&[ObjectKind::Schema, ObjectKind::Table], dir.path());

    let report = Reconciler::new(&catalog, settings).run().await.expect("run succeeds");

    assert_eq!(report.objects, 2);
    assert_eq!(
        read_artifact(dir.path(), REVOKES_ARTIFACT),
        vec!["REVOKE ALL PRIVILEGES ON TABLE D.S.T FROM ROLE A"]
    );
    assert_eq!(
        read_artifact(dir.path(), OWNERSHIPS_ARTIFACT),
        vec!["GRANT OWNERSHIP ON TABLE D.S.T TO ROLE C -- instead of B"]
    );
    assert_eq!(
        read_artifact(dir.path(), NEW_GRANTS_ARTIFACT),
        vec![
            "GRANT USAGE ON SCHEMA D.S TO ROLE C",
            "GRANT ALL PRIVILEGES ON FUTURE TABLES IN SCHEMA D.S TO ROLE C",
            "GRANT ALL PRIVILEGES ON ALL TABLES IN SCHEMA D.S TO ROLE C",
        ]
    );
}

#[tokio::test]
async fn dry_run_executes_no_ddl() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = scenario_catalog();
    let settings = make_settings(&[ObjectKind::Schema, ObjectKind::Table], dir.path());

    let report = Reconciler::new(&catalog, settings).run().await.expect("run succeeds");

    assert!(report.revokes.execution.is_none());
    assert!(report.ownerships.execution.is_none());
    let executed = catalog.executed().expect("statement log");
    assert!(executed.iter().all(|statement| statement.starts_with("SHOW ")));
    assert_eq!(catalog.owner_of("D.S.T").expect("owner"), Some(Grantee::role("B")));
}

#[tokio::test]
async fn applies_plan_and_rerun_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = account_catalog();
    let mut settings = make_settings(&ACCOUNT_KINDS, dir.path());
    settings.run_dry = false;

    let reconciler = Reconciler::new(&catalog, settings);
    let first = reconciler.plan().await;
    assert!(!first.is_empty());

    let pool = WorkerPool::default();
    let revoked = run_many(&catalog, &first.revoke_statements, pool).await;
    let transferred = run_many(&catalog, &first.ownership_statements, pool).await;
    assert_eq!(revoked.failed(), 0);
    assert_eq!(transferred.failed(), 0);

    let second = reconciler.plan().await;
    assert!(second.is_empty(), "second plan: {second:?}");
    assert_eq!(catalog.owner_of("D.S.P(FLOAT, VARCHAR)").expect("owner"), Some(Grantee::role("C")));
    assert_eq!(catalog.owner_of("D.S").expect("owner"), Some(Grantee::role("SYSADMIN")));
}

#[tokio::test]
async fn plans_account_wide_reconciliation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = account_catalog();
    let settings = make_settings(&ACCOUNT_KINDS, dir.path());

    let plan = Reconciler::new(&catalog, settings).plan().await;
    let mut revokes = rendered(&plan.revoke_statements);
    let mut ownerships = rendered(&plan.ownership_statements);
    revokes.sort();
    ownerships.sort();

    assert_eq!(
        revokes,
        vec![
            "REVOKE ALL PRIVILEGES ON DATABASE D FROM ROLE ANALYST",
            "REVOKE ALL PRIVILEGES ON FUTURE TABLES IN SCHEMA D.S FROM ROLE ANALYST",
            "REVOKE ALL PRIVILEGES ON FUTURE VIEWS IN DATABASE D FROM ROLE ANALYST",
            "REVOKE ALL PRIVILEGES ON PROCEDURE D.S.P(FLOAT, VARCHAR) FROM ROLE ANALYST",
            "REVOKE ALL PRIVILEGES ON SCHEMA D.S FROM ROLE ANALYST",
            "REVOKE ALL PRIVILEGES ON TABLE D.S.T FROM ROLE ANALYST",
            "REVOKE ALL PRIVILEGES ON TABLE D.S.T FROM ROLE LOADER",
        ]
    );
    assert_eq!(
        ownerships,
        vec![
            "GRANT OWNERSHIP ON PROCEDURE D.S.P() TO ROLE C -- instead of DEV",
            "GRANT OWNERSHIP ON PROCEDURE D.S.P(FLOAT, VARCHAR) TO ROLE C -- instead of DEV",
            "GRANT OWNERSHIP ON TABLE D.S.T TO ROLE C -- instead of LOADER",
            "GRANT OWNERSHIP ON TABLE E.RAW.EVENTS TO ROLE C -- instead of LOADER",
        ]
    );
}

#[tokio::test]
async fn working_database_filter_limits_scope() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = account_catalog();
    let mut settings = make_settings(&ACCOUNT_KINDS, dir.path());
    settings.databases = vec!["E".to_string()];

    let plan = Reconciler::new(&catalog, settings).plan().await;

    assert!(plan.revoke_statements.is_empty());
    assert_eq!(
        rendered(&plan.ownership_statements),
        vec!["GRANT OWNERSHIP ON TABLE E.RAW.EVENTS TO ROLE C -- instead of LOADER"]
    );
}

#[tokio::test]
async fn failures_are_isolated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = scenario_catalog()
        .with_object(ObjectKind::Table, "D", "S", "U")
        .with_grant(ObjectKind::Table, "D.S.U", "SELECT", Grantee::role("A"))
        .with_object(ObjectKind::Table, "D", "S", "W")
        .with_grant(ObjectKind::Table, "D.S.W", "SELECT", Grantee::role("A"))
        .failing_on("SHOW GRANTS ON TABLE D.S.U")
        .failing_on("REVOKE ALL PRIVILEGES ON TABLE D.S.T FROM ROLE A");
    let mut settings = make_settings(&[ObjectKind::Schema, ObjectKind::Table], dir.path());
    settings.run_dry = false;

    let report = Reconciler::new(&catalog, settings).run().await.expect("run completes");

    let revokes = report.revokes.execution.as_ref().expect("revokes executed");
    assert_eq!(revokes.succeeded, 1);
    assert_eq!(revokes.failures.len(), 1);
    assert_eq!(revokes.failures[0].statement, "REVOKE ALL PRIVILEGES ON TABLE D.S.T FROM ROLE A");
    assert_eq!(report.failed_statements(), 1);

    // U could not be inspected, so its grant survives; W was revoked.
    assert!(held_by(&catalog, "D.S.U", "A"));
    assert!(!held_by(&catalog, "D.S.W", "A"));
    assert!(held_by(&catalog, "D.S.T", "A"));
    assert_eq!(catalog.owner_of("D.S.T").expect("owner"), Some(Grantee::role("C")));
}

#[tokio::test]
async fn empty_plan_leaves_empty_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(REVOKES_ARTIFACT), "stale").expect("seed stale artifact");
    let catalog = InMemoryCatalog::default();
    let settings = make_settings(&[ObjectKind::Table], dir.path());

    let report = Reconciler::new(&catalog, settings).run().await.expect("run succeeds");

    assert_eq!(report.objects, 0);
    for name in [REVOKES_ARTIFACT, OWNERSHIPS_ARTIFACT, NEW_GRANTS_ARTIFACT] {
        let text = fs::read_to_string(dir.path().join(name)).expect("artifact exists");
        assert!(text.is_empty(), "{name} should be empty");
    }
}
