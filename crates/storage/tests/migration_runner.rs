use oc_storage::{Migration, SqliteStore, builtin_migrations, validate_migrations};
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_storage_dir(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    path.push(format!("orgcore-{label}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&path).expect("temp storage dir must be creatable");
    path
}

fn migration(version: i64, up: &[&str], down: &[&str]) -> Migration {
    Migration {
        version,
        description: format!("test migration {version}"),
        up: up.iter().map(|s| s.to_string()).collect(),
        down: down.iter().map(|s| s.to_string()).collect(),
    }
}

fn table_exists(db_path: &std::path::Path, table: &str) -> bool {
    let conn = Connection::open(db_path).expect("raw connection should open");
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .is_ok()
}

#[test]
fn open_applies_the_builtin_registry_once() {
    let dir = temp_storage_dir("builtin");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    assert_eq!(
        store
            .schema_version_current()
            .expect("schema version should read"),
        3
    );

    let applied = store
        .run_migrations(&builtin_migrations())
        .expect("re-running the registry should be a no-op");
    assert_eq!(applied, 0, "an up-to-date store applies nothing");

    drop(store);
    let store = SqliteStore::open(&dir).expect("reopening should not re-apply");
    assert_eq!(
        store
            .schema_version_current()
            .expect("schema version should read"),
        3
    );
}

#[test]
fn pending_migrations_apply_in_ascending_order() {
    let dir = temp_storage_dir("ascending");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");

    let mut set = builtin_migrations();
    // Deliberately unordered: the runner must sort by version.
    set.push(migration(
        5,
        &["CREATE TABLE gadgets (id TEXT PRIMARY KEY, widget_id TEXT REFERENCES widgets(id))"],
        &["DROP TABLE IF EXISTS gadgets"],
    ));
    set.push(migration(
        4,
        &["CREATE TABLE widgets (id TEXT PRIMARY KEY)"],
        &["DROP TABLE IF EXISTS widgets"],
    ));

    let applied = store
        .run_migrations(&set)
        .expect("pending migrations should apply");
    assert_eq!(applied, 2, "only the two new versions are pending");
    assert_eq!(
        store
            .schema_version_current()
            .expect("schema version should read"),
        5
    );
    assert!(table_exists(&store.db_path(), "widgets"));
    assert!(table_exists(&store.db_path(), "gadgets"));
}

#[test]
fn a_failing_migration_rolls_back_and_keeps_prior_commits() {
    let dir = temp_storage_dir("partial-failure");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");

    let mut set = builtin_migrations();
    set.push(migration(
        4,
        &["CREATE TABLE widgets (id TEXT PRIMARY KEY)"],
        &["DROP TABLE IF EXISTS widgets"],
    ));
    set.push(migration(
        5,
        &[
            "CREATE TABLE doomed (id TEXT PRIMARY KEY)",
            "CREATE BOGUS SYNTAX ERROR",
        ],
        &[],
    ));

    let err = store
        .run_migrations(&set)
        .expect_err("the bad statement must fail the run");
    match err {
        oc_storage::StoreError::MigrationFailed { version, .. } => {
            assert_eq!(version, 5, "the error must name the offending version")
        }
        other => panic!("expected MigrationFailed, got {other:?}"),
    }

    assert_eq!(
        store
            .schema_version_current()
            .expect("schema version should read"),
        4,
        "the prior migration must stay committed"
    );
    assert!(table_exists(&store.db_path(), "widgets"));
    assert!(
        !table_exists(&store.db_path(), "doomed"),
        "the failed migration's partial work must roll back"
    );

    // Re-invocation is idempotent: only the still-pending version runs.
    let err = store
        .run_migrations(&set)
        .expect_err("the bad migration is still pending");
    assert_eq!(err.code(), "MIGRATION_FAILED");
}

#[test]
fn rollback_reverses_the_most_recent_migrations() {
    let dir = temp_storage_dir("rollback");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");

    let mut set = builtin_migrations();
    set.push(migration(
        4,
        &["CREATE TABLE widgets (id TEXT PRIMARY KEY)"],
        &["DROP TABLE IF EXISTS widgets"],
    ));
    store
        .run_migrations(&set)
        .expect("the extra migration should apply");
    assert!(table_exists(&store.db_path(), "widgets"));

    let rolled_back = store
        .rollback_migrations(&set, 1)
        .expect("rollback should run");
    assert_eq!(rolled_back, 1);
    assert_eq!(
        store
            .schema_version_current()
            .expect("schema version should read"),
        3
    );
    assert!(
        !table_exists(&store.db_path(), "widgets"),
        "the down statements must have run"
    );

    // And the migration is pending again.
    let applied = store
        .run_migrations(&set)
        .expect("the rolled-back migration should re-apply");
    assert_eq!(applied, 1);
}

#[test]
fn rollback_without_down_statements_is_refused() {
    let dir = temp_storage_dir("rollback-unsupported");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");

    let mut set = builtin_migrations();
    set.push(migration(
        4,
        &["CREATE TABLE one_way (id TEXT PRIMARY KEY)"],
        &[],
    ));
    store
        .run_migrations(&set)
        .expect("the irreversible migration should apply");

    let err = store
        .rollback_migrations(&set, 1)
        .expect_err("rolling back without down statements must fail");
    assert_eq!(err.code(), "ROLLBACK_UNSUPPORTED");
    assert_eq!(
        store
            .schema_version_current()
            .expect("schema version should read"),
        4,
        "a refused rollback must not mutate anything"
    );

    let err = store
        .rollback_migrations(&builtin_migrations(), 1)
        .expect_err("an applied version missing from the set must fail");
    assert_eq!(err.code(), "MIGRATION_FAILED");
}

#[test]
fn descriptor_validation_rejects_malformed_sets() {
    let bad_sets: Vec<Vec<Migration>> = vec![
        vec![migration(0, &["SELECT 1"], &[])],
        vec![migration(-2, &["SELECT 1"], &[])],
        vec![
            migration(1, &["SELECT 1"], &[]),
            migration(1, &["SELECT 2"], &[]),
        ],
        vec![Migration {
            version: 1,
            description: "  ".to_string(),
            up: vec!["SELECT 1".to_string()],
            down: vec![],
        }],
        vec![migration(1, &[], &[])],
        vec![migration(1, &["SELECT 1", "   "], &[])],
    ];

    for set in &bad_sets {
        let err = validate_migrations(set).expect_err("malformed set must be rejected");
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    // The same validation gates execution.
    let dir = temp_storage_dir("validation-gates");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    let err = store
        .run_migrations(&bad_sets[0])
        .expect_err("the runner must validate before executing");
    assert_eq!(err.code(), "INVALID_INPUT");
}
