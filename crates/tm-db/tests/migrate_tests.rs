//! End-to-end tests: definition files on disk applied to a DuckDB file.

use std::fs;
use std::path::Path;
use tm_core::{MigrationStore, SchemaOps, Target};
use tm_db::{DbError, DuckDbConnection, MigrationRunner, RunOutcome, TableVersionTracker};

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

/// users table, then a backfilled nickname column, then a production-only index
fn shop_migrations(dir: &Path) {
    write(
        dir,
        "1a2b3c_create_users.yml",
        r#"
revision: 1a2b3c
description: create users
upgrade:
  - sql: |
      CREATE TABLE users (id INTEGER, name VARCHAR);
      INSERT INTO users SELECT range, 'user' || CAST(range AS VARCHAR) FROM range(25);
downgrade:
  - sql: DROP TABLE users
"#,
    );
    write(
        dir,
        "4d5e6f_add_nickname.yml",
        r#"
revision: 4d5e6f
down_revision: 1a2b3c
description: add nickname
upgrade:
  - sql: ALTER TABLE users ADD COLUMN nickname VARCHAR
    unless:
      column_exists: { table: users, column: nickname }
  - batch:
      sql: UPDATE users SET nickname = name WHERE id IN (SELECT id FROM users WHERE nickname IS NULL LIMIT {batch_size})
      size: 10
downgrade:
  - sql: ALTER TABLE users DROP COLUMN nickname
"#,
    );
    write(
        dir,
        "7a8b9c_nickname_index.yml",
        r#"
revision: 7a8b9c
down_revision: 4d5e6f
upgrade:
  - sql: CREATE INDEX users_nickname_idx ON users (nickname)
    environments: [production]
downgrade:
  - sql: DROP INDEX users_nickname_idx
    when:
      index_exists: users_nickname_idx
"#,
    );
}

fn count(db: &DuckDbConnection, sql: &str) -> i64 {
    db.conn().query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn test_upgrade_and_downgrade_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let migrations = dir.path().join("migrations");
    fs::create_dir(&migrations).unwrap();
    shop_migrations(&migrations);

    let store = MigrationStore::load(&migrations).unwrap();
    let db = DuckDbConnection::from_path(&dir.path().join("shop.duckdb")).unwrap();
    let tracker = TableVersionTracker::new("tidemark_version");
    let runner = MigrationRunner::new(&db, &tracker);

    let report = runner.upgrade(&store, &Target::Head).unwrap();
    assert_eq!(report.outcome, RunOutcome::Applied);
    assert_eq!(runner.current().unwrap().as_deref(), Some("7a8b9c"));
    assert_eq!(
        count(&db, "SELECT COUNT(*) FROM users WHERE nickname IS NULL"),
        0
    );
    // development run skips the production-only index
    assert!(!db.index_exists("users_nickname_idx").unwrap());

    runner.downgrade(&store, &Target::Relative(-2)).unwrap();
    assert_eq!(runner.current().unwrap().as_deref(), Some("1a2b3c"));
    assert!(!db.column_exists("users", "nickname").unwrap());
    assert!(db.table_exists("users").unwrap());

    let history = runner.history(&store).unwrap();
    assert!(history.iter().all(|e| !e.checksum_drift));
    assert_eq!(history.iter().filter(|e| e.applied).count(), 1);
}

#[test]
fn test_production_environment_runs_guarded_steps() {
    let dir = tempfile::tempdir().unwrap();
    shop_migrations(dir.path());

    let store = MigrationStore::load(dir.path()).unwrap();
    let db = DuckDbConnection::in_memory().unwrap();
    let tracker = TableVersionTracker::new("tidemark_version");
    let runner = MigrationRunner::new(&db, &tracker).with_environment("production");

    runner.upgrade(&store, &Target::Head).unwrap();
    assert!(db.index_exists("users_nickname_idx").unwrap());

    runner.downgrade(&store, &Target::Base).unwrap();
    assert!(!db.table_exists("users").unwrap());
    assert_eq!(runner.current().unwrap(), None);
}

#[test]
fn test_marker_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let migrations = dir.path().join("migrations");
    fs::create_dir(&migrations).unwrap();
    shop_migrations(&migrations);
    let db_path = dir.path().join("shop.duckdb");
    let store = MigrationStore::load(&migrations).unwrap();
    let tracker = TableVersionTracker::new("tidemark_version");

    {
        let db = DuckDbConnection::from_path(&db_path).unwrap();
        MigrationRunner::new(&db, &tracker)
            .upgrade(&store, &Target::Revision("4d5e".into()))
            .unwrap();
    }

    let db = DuckDbConnection::from_path(&db_path).unwrap();
    let runner = MigrationRunner::new(&db, &tracker);
    assert_eq!(runner.current().unwrap().as_deref(), Some("4d5e6f"));
    let report = runner.upgrade(&store, &Target::Head).unwrap();
    let applied: Vec<&str> = report.steps.iter().map(|s| s.revision.as_str()).collect();
    assert_eq!(applied, vec!["7a8b9c"]);
}

#[test]
fn test_failing_sql_leaves_previous_revision() {
    let dir = tempfile::tempdir().unwrap();
    shop_migrations(dir.path());
    write(
        dir.path(),
        "9f9f9f_broken.yml",
        r#"
revision: 9f9f9f
down_revision: 7a8b9c
upgrade:
  - sql: CREATE TABLE audit (id INTEGER)
  - sql: ALTER TABLE no_such_table ADD COLUMN x INTEGER
"#,
    );

    let store = MigrationStore::load(dir.path()).unwrap();
    let db = DuckDbConnection::in_memory().unwrap();
    let tracker = TableVersionTracker::new("tidemark_version");
    let runner = MigrationRunner::new(&db, &tracker);

    let err = runner.upgrade(&store, &Target::Head).unwrap_err();
    match &err {
        DbError::StepExecutionFailure {
            revision, marker, ..
        } => {
            assert_eq!(revision, "9f9f9f");
            assert_eq!(marker.as_deref(), Some("7a8b9c"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.current().unwrap().as_deref(), Some("7a8b9c"));
    assert!(!db.table_exists("audit").unwrap());
}
