mod common;

use common::{create_db, POOL_WAIT, STUDENTS};
use datachat::db::{Access, Database, QueryErrorKind, QueryStatus, Sandbox};
use std::time::Duration;

fn sandbox() -> Sandbox {
    Sandbox::new(Duration::from_secs(10), 1000)
}

async fn count_students(sandbox: &Sandbox, db: &Database) -> serde_json::Value {
    let result = sandbox.execute(db, "SELECT COUNT(*) AS n FROM students").await;
    assert_eq!(result.status, QueryStatus::Ok);
    result.rows[0]["n"].clone()
}

#[tokio::test]
async fn select_returns_rows_and_columns() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(create_db(dir.path(), "s.duckdb", STUDENTS), 2, POOL_WAIT).unwrap();

    let result = sandbox().execute(&db, "SELECT id, name FROM students ORDER BY id").await;

    assert_eq!(result.status, QueryStatus::Ok);
    assert_eq!(result.columns.len(), 2);
    assert_eq!(result.columns[1].name, "name");
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.rows[0]["name"], "Ann");
    assert!(!result.truncated);
    assert!(result.error_kind.is_none());
}

#[tokio::test]
async fn no_matching_rows_is_empty_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(create_db(dir.path(), "s.duckdb", STUDENTS), 2, POOL_WAIT).unwrap();

    let result = sandbox().execute(&db, "SELECT * FROM students WHERE id > 100").await;

    assert_eq!(result.status, QueryStatus::Empty);
    assert!(result.rows.is_empty());
    assert_eq!(result.columns.len(), 3);
}

#[tokio::test]
async fn failures_are_classified() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(create_db(dir.path(), "s.duckdb", STUDENTS), 2, POOL_WAIT).unwrap();
    let sandbox = sandbox();

    let syntax = sandbox.execute(&db, "SELECT * FROM students WHERE").await;
    assert_eq!(syntax.status, QueryStatus::Error);
    assert_eq!(syntax.error_kind, Some(QueryErrorKind::Syntax));
    assert!(syntax.error_detail.is_some());

    let missing = sandbox.execute(&db, "SELECT * FROM teachers").await;
    assert_eq!(missing.error_kind, Some(QueryErrorKind::ConstraintOrRuntime));

    let conversion = sandbox.execute(&db, "SELECT CAST(name AS INTEGER) FROM students").await;
    assert_eq!(conversion.error_kind, Some(QueryErrorKind::ConstraintOrRuntime));
}

#[tokio::test]
async fn rows_beyond_the_cap_are_truncated_and_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(create_db(dir.path(), "s.duckdb", STUDENTS), 2, POOL_WAIT).unwrap();

    let result = Sandbox::new(Duration::from_secs(10), 2)
        .execute(&db, "SELECT * FROM range(10)")
        .await;

    assert_eq!(result.rows.len(), 2);
    assert!(result.truncated);

    let exact = Sandbox::new(Duration::from_secs(10), 3)
        .execute(&db, "SELECT * FROM students")
        .await;
    assert_eq!(exact.rows.len(), 3);
    assert!(!exact.truncated);
}

#[tokio::test]
async fn repeated_execution_gives_the_same_result() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(create_db(dir.path(), "s.duckdb", STUDENTS), 2, POOL_WAIT).unwrap();
    let sandbox = sandbox();

    let a = sandbox.execute(&db, "SELECT name, grade FROM students ORDER BY grade").await;
    let b = sandbox.execute(&db, "SELECT name, grade FROM students ORDER BY grade").await;
    assert!(a.same_outcome(&b));
}

#[tokio::test]
async fn writes_fail_on_a_read_only_handle() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(create_db(dir.path(), "s.duckdb", STUDENTS), 2, POOL_WAIT).unwrap();
    let sandbox = sandbox();

    // bypasses the statement validator on purpose
    let result = sandbox.execute(&db, "DELETE FROM students").await;
    assert_eq!(result.status, QueryStatus::Error);

    let result = sandbox.execute(&db, "CREATE TABLE evil (x INTEGER)").await;
    assert_eq!(result.status, QueryStatus::Error);

    assert_eq!(count_students(&sandbox, &db).await, 3);
}

#[tokio::test]
async fn writes_are_rolled_back_on_a_writable_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(dir.path(), "s.duckdb", STUDENTS);
    let db = Database::open_with_access(&path, 2, POOL_WAIT, Access::ReadWrite).unwrap();
    let sandbox = sandbox();

    sandbox.execute(&db, "DELETE FROM students").await;
    sandbox.execute(&db, "INSERT INTO students VALUES (4, 'Di', 60)").await;

    assert_eq!(count_students(&sandbox, &db).await, 3);
}

#[tokio::test]
async fn starved_pool_reports_a_connection_error_before_the_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(dir.path(), "s.duckdb", STUDENTS);
    let db = Database::open(&path, 1, Duration::from_millis(200)).unwrap();
    let held = db.connection().unwrap();

    let result = sandbox().execute(&db, "SELECT * FROM students").await;

    assert_eq!(result.error_kind, Some(QueryErrorKind::Connection));
    assert!(result.elapsed_ms < 10_000);

    drop(held);
    assert_eq!(count_students(&sandbox(), &db).await, 3);
}
