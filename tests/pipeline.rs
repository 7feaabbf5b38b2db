mod common;

use common::{config, create_db, ScriptedGenerator, GRADES, STUDENTS};
use datachat::chart::ChartKind;
use datachat::db::{QueryErrorKind, QueryStatus};
use datachat::llm::LlmError;
use datachat::session::history::Role;
use datachat::{Pipeline, PipelineError, SessionHandle};
use std::sync::Arc;
use std::time::Duration;

async fn session_with(pipeline: &Pipeline, path: &std::path::Path) -> SessionHandle {
    let session = SessionHandle::new();
    pipeline.select_database(&session, path).await.unwrap();
    session
}

#[tokio::test]
async fn show_all_students_is_a_plain_table() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "school.duckdb", STUDENTS);
    let generator = ScriptedGenerator::new(["```sql\nSELECT * FROM students ORDER BY id;\n```"]);
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator.clone()));
    let session = session_with(&pipeline, &db).await;

    let answer = pipeline.ask(&session, "Show me all students").await.unwrap();

    let result = answer.result.unwrap();
    assert_eq!(result.status, QueryStatus::Ok);
    assert_eq!(result.rows.len(), 3);
    assert_eq!(answer.chart_spec.unwrap().kind, ChartKind::TableOnly);
    assert_eq!(answer.sql.as_deref(), Some("SELECT * FROM students ORDER BY id"));
    assert!(!answer.cached);

    // the prompt was grounded in the introspected schema
    let prompt = &generator.prompts()[0];
    assert!(prompt.user.contains("CREATE TABLE \"students\""));
    assert!(prompt.user.contains("Show me all students"));
}

#[tokio::test]
async fn average_grade_by_subject_is_a_bar_chart() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "grades.duckdb", GRADES);
    let generator = ScriptedGenerator::new([
        "SELECT subject, AVG(grade) AS avg_grade FROM grades GROUP BY subject ORDER BY subject;",
    ]);
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator));
    let session = session_with(&pipeline, &db).await;

    let answer = pipeline.ask(&session, "Average grade by subject").await.unwrap();

    assert!(answer.sql.as_deref().unwrap().contains("GROUP BY subject"));
    let result = answer.result.unwrap();
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0]["subject"], "Math");
    assert_eq!(result.rows[0]["avg_grade"], 85.0);
    let chart = answer.chart_spec.unwrap();
    assert_eq!(chart.kind, ChartKind::Bar);
    assert_eq!(chart.x.as_deref(), Some("subject"));
    assert_eq!(chart.y.as_deref(), Some("avg_grade"));
}

#[tokio::test]
async fn broken_sql_is_surfaced_after_three_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "school.duckdb", STUDENTS);
    let generator = ScriptedGenerator::new([
        "SELECT nope FROM students",
        "SELECT still_nope FROM students",
        "SELECT never FROM students",
        "SELECT * FROM students",
    ]);
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator.clone()));
    let session = session_with(&pipeline, &db).await;

    let answer = pipeline.ask(&session, "Who is the best student?").await.unwrap();

    assert_eq!(generator.calls(), 3);
    let result = answer.result.unwrap();
    assert_eq!(result.status, QueryStatus::Error);
    assert_eq!(result.error_kind, Some(QueryErrorKind::ConstraintOrRuntime));
    assert_eq!(answer.sql.as_deref(), Some("SELECT never FROM students"));
    assert!(answer.text.contains("after 3 attempts"));

    // each retry carries the failures before it
    let prompts = generator.prompts();
    assert!(!prompts[0].user.contains("Failed attempts"));
    assert!(prompts[1].user.contains("SELECT nope FROM students"));
    assert!(prompts[2].user.contains("Attempt 2:"));

    let state = session.lock().await;
    let last = state.history().turns().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.result.as_ref().unwrap().status, QueryStatus::Error);
    assert_eq!(state.analytics().error_count, 1);
    assert!(state.cache().is_empty());
}

#[tokio::test]
async fn syntax_error_is_repaired_on_the_next_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "school.duckdb", STUDENTS);
    let generator = ScriptedGenerator::new([
        "SELECT * FROM students WHERE",
        "SELECT COUNT(*) AS n FROM students",
    ]);
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator.clone()));
    let session = session_with(&pipeline, &db).await;

    let answer = pipeline.ask(&session, "How many students?").await.unwrap();

    assert_eq!(generator.calls(), 2);
    assert!(generator.prompts()[1].user.contains("SELECT * FROM students WHERE"));
    let result = answer.result.unwrap();
    assert_eq!(result.status, QueryStatus::Ok);
    assert_eq!(result.rows[0]["n"], 3);
    assert_eq!(answer.text, "The answer is 3 (n).");
    assert_eq!(session.lock().await.analytics().success_count, 1);
}

#[tokio::test]
async fn unsafe_sql_is_rejected_without_execution() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "school.duckdb", STUDENTS);
    let generator = ScriptedGenerator::new(["DROP TABLE students;", "SELECT COUNT(*) AS n FROM students"]);
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator.clone()));
    let session = session_with(&pipeline, &db).await;

    let answer = pipeline.ask(&session, "Remove the students table").await.unwrap();

    assert_eq!(generator.calls(), 1);
    let result = answer.result.unwrap();
    assert_eq!(result.error_kind, Some(QueryErrorKind::UnsafeQuery));
    assert!(answer.text.starts_with("Cannot run that query"));

    let analytics = session.lock().await.analytics().snapshot();
    assert_eq!(analytics.total_queries, 1);
    assert_eq!(analytics.error_count, 1);

    let still_there = pipeline.ask(&session, "How many students?").await.unwrap();
    assert_eq!(still_there.result.unwrap().rows[0]["n"], 3);
}

#[tokio::test]
async fn repeated_question_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "school.duckdb", STUDENTS);
    let generator = ScriptedGenerator::new(["SELECT COUNT(*) AS n FROM students"]);
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator.clone()));
    let session = session_with(&pipeline, &db).await;

    let first = pipeline.ask(&session, "How many students?").await.unwrap();
    let second = pipeline.ask(&session, "  how MANY students ").await.unwrap();

    assert_eq!(generator.calls(), 1);
    assert!(second.cached);
    assert_eq!(second.sql, first.sql);
    assert!(second.result.unwrap().same_outcome(&first.result.unwrap()));

    let state = session.lock().await;
    assert_eq!(state.history().len(), 4);
    let analytics = state.analytics().snapshot();
    assert_eq!(analytics.total_queries, 2);
    assert_eq!(analytics.cache_hits, 1);
    assert_eq!(analytics.success_rate, 100.0);
}

#[tokio::test]
async fn errors_are_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "school.duckdb", STUDENTS);
    let generator = ScriptedGenerator::new(["DELETE FROM students", "SELECT COUNT(*) AS n FROM students"]);
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator.clone()));
    let session = session_with(&pipeline, &db).await;

    let first = pipeline.ask(&session, "How many students?").await.unwrap();
    assert!(first.result.unwrap().is_error());

    let second = pipeline.ask(&session, "How many students?").await.unwrap();
    assert!(!second.cached);
    assert_eq!(second.result.unwrap().status, QueryStatus::Ok);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn switching_databases_clears_the_cache_and_changes_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let school = create_db(dir.path(), "school.duckdb", STUDENTS);
    let grades = create_db(dir.path(), "grades.duckdb", GRADES);
    let generator = ScriptedGenerator::new(["SELECT COUNT(*) AS n FROM students"]);
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator));
    let session = SessionHandle::new();

    let before = pipeline.select_database(&session, &school).await.unwrap();
    pipeline.ask(&session, "How many students?").await.unwrap();
    assert_eq!(session.lock().await.cache().len(), 1);

    let after = pipeline.select_database(&session, &grades).await.unwrap();

    assert_ne!(before.fingerprint, after.fingerprint);
    let state = session.lock().await;
    assert!(state.cache().is_empty());
    assert_eq!(state.schema().unwrap().tables[0].name, "grades");
    // chat history survives a database switch
    assert_eq!(state.history().len(), 2);
}

#[tokio::test]
async fn unreadable_database_leaves_no_schema_selected() {
    let dir = tempfile::tempdir().unwrap();
    let school = create_db(dir.path(), "school.duckdb", STUDENTS);
    let garbage = dir.path().join("garbage.duckdb");
    std::fs::write(&garbage, b"this is not a database").unwrap();

    let pipeline = Pipeline::with_generator(&config(), Box::new(ScriptedGenerator::default()));
    let session = session_with(&pipeline, &school).await;

    let err = pipeline.select_database(&session, &garbage).await.unwrap_err();
    assert!(matches!(err, PipelineError::Introspection(_)));
    assert!(session.lock().await.schema().is_none());

    let err = pipeline.ask(&session, "How many students?").await.unwrap_err();
    assert!(matches!(err, PipelineError::NoDatabase));

    let missing = dir.path().join("missing.duckdb");
    assert!(pipeline.select_database(&session, &missing).await.is_err());
}

#[tokio::test]
async fn answer_from_a_replaced_database_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let school = create_db(dir.path(), "school.duckdb", STUDENTS);
    let grades = create_db(dir.path(), "grades.duckdb", GRADES);
    let generator = ScriptedGenerator::new(["SELECT COUNT(*) AS n FROM students"])
        .with_delay(Duration::from_millis(300));
    let pipeline = Arc::new(Pipeline::with_generator(&config(), Box::new(generator)));
    let session = session_with(&pipeline, &school).await;

    let in_flight = {
        let pipeline = Arc::clone(&pipeline);
        let session = session.clone();
        tokio::spawn(async move { pipeline.ask(&session, "How many students?").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    pipeline.select_database(&session, &grades).await.unwrap();

    let outcome = in_flight.await.unwrap();
    assert!(matches!(outcome, Err(PipelineError::Superseded)));

    let state = session.lock().await;
    assert!(state.history().is_empty());
    assert!(state.cache().is_empty());
    assert_eq!(state.analytics().total_queries, 0);
}

#[tokio::test]
async fn second_question_while_busy_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let school = create_db(dir.path(), "school.duckdb", STUDENTS);
    let generator = ScriptedGenerator::new(["SELECT 1 AS one;"]).with_delay(Duration::from_millis(300));
    let pipeline = Arc::new(Pipeline::with_generator(&config(), Box::new(generator)));
    let session = session_with(&pipeline, &school).await;

    let in_flight = {
        let pipeline = Arc::clone(&pipeline);
        let session = session.clone();
        tokio::spawn(async move { pipeline.ask(&session, "one").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = pipeline.ask(&session, "two").await.unwrap_err();
    assert!(matches!(err, PipelineError::Busy));
    assert!(in_flight.await.unwrap().is_ok());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn clarification_is_a_text_only_answer() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "school.duckdb", STUDENTS);
    let generator = ScriptedGenerator::new(["Which semester do you mean?"]);
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator));
    let session = session_with(&pipeline, &db).await;

    let answer = pipeline.ask(&session, "Grades last term?").await.unwrap();

    assert_eq!(answer.text, "Which semester do you mean?");
    assert!(answer.sql.is_none());
    assert!(answer.result.is_none());
    assert!(answer.chart_spec.is_none());
    assert_eq!(session.lock().await.analytics().success_count, 1);
}

#[tokio::test]
async fn provider_failure_becomes_an_error_turn() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "school.duckdb", STUDENTS);
    let generator = ScriptedGenerator::failing(LlmError::RateLimited("429".to_string()));
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator));
    let session = session_with(&pipeline, &db).await;

    let answer = pipeline.ask(&session, "How many students?").await.unwrap();

    let result = answer.result.unwrap();
    assert_eq!(result.error_kind, Some(QueryErrorKind::Provider));
    assert!(answer.text.contains("try again later"));
    assert_eq!(session.lock().await.analytics().error_count, 1);
}

#[tokio::test]
async fn model_slower_than_its_timeout_becomes_an_error_turn() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "school.duckdb", STUDENTS);
    let mut cfg = config();
    cfg.llm.timeout_secs = 1;
    let generator = ScriptedGenerator::new(["SELECT COUNT(*) AS n FROM students"])
        .with_delay(Duration::from_secs(3));
    let pipeline = Pipeline::with_generator(&cfg, Box::new(generator.clone()));
    let session = session_with(&pipeline, &db).await;

    let answer = pipeline.ask(&session, "How many students?").await.unwrap();

    assert_eq!(answer.result.unwrap().error_kind, Some(QueryErrorKind::Provider));
    assert_eq!(generator.calls(), 1);

    let state = session.lock().await;
    let last = state.history().turns().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.result.as_ref().unwrap().status, QueryStatus::Error);
    assert_eq!(state.analytics().error_count, 1);
}

#[tokio::test]
async fn empty_question_and_missing_database_are_caller_errors() {
    let pipeline = Pipeline::with_generator(&config(), Box::new(ScriptedGenerator::default()));
    let session = SessionHandle::new();

    assert!(matches!(
        pipeline.ask(&session, "   ").await,
        Err(PipelineError::EmptyQuestion)
    ));
    assert!(matches!(
        pipeline.ask(&session, "How many?").await,
        Err(PipelineError::NoDatabase)
    ));
}

#[tokio::test]
async fn seeded_sample_database_answers_questions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("university.duckdb");
    datachat::db::sample::create_sample_database(&path).unwrap();

    let generator = ScriptedGenerator::new([
        "SELECT g.grade, COUNT(*) AS student_count FROM grades g GROUP BY g.grade ORDER BY g.grade",
    ]);
    let pipeline = Pipeline::with_generator(&config(), Box::new(generator));
    let session = SessionHandle::new();
    let schema = pipeline.select_database(&session, &path).await.unwrap();
    assert_eq!(schema.tables.len(), 6);

    let answer = pipeline.ask(&session, "How many grades of each letter?").await.unwrap();
    assert_eq!(answer.result.unwrap().rows.len(), 5);
    assert_eq!(answer.chart_spec.unwrap().kind, ChartKind::Pie);
}
