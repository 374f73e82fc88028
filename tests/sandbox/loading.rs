use prepbox::{EngineSession, Error, ExerciseInput, ExerciseKind, LoadOutcome, SessionState};
use serde_json::json;

use crate::common::*;

#[tokio::test(flavor = "current_thread")]
async fn test_all_dataset_sources_materialize() {
    let (sandbox, report) = seeded_sql_sandbox().await;
    assert_eq!(report.tables, vec!["customers", "orders", "products"]);
    assert_eq!(report.bulk_loaded, 1);

    let result = sandbox
        .submit(
            "SELECT c.name, SUM(o.amount) AS total \
             FROM orders o JOIN customers c ON o.customer_id = c.customer_id \
             GROUP BY c.name ORDER BY total DESC",
        )
        .await
        .unwrap();
    let table = result.table().unwrap();
    assert_eq!(table.columns, vec!["name", "total"]);
    assert_eq!(
        table.rows,
        vec![
            vec![json!("Lovelace, Ada"), json!(65.5)],
            vec![json!("Grace Hopper"), json!(12.0)],
        ]
    );

    let products = sandbox
        .submit("SELECT sku, price FROM products ORDER BY sku")
        .await
        .unwrap();
    assert_eq!(
        products.table().unwrap().rows,
        vec![vec![json!("A-1"), json!(9.99)], vec![json!("B-2"), json!(19.5)]]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn test_same_definition_loads_once() {
    let (sandbox, _) = seeded_sql_sandbox().await;
    let statements = sandbox.metrics().snapshot().statements;

    let outcome = sandbox.prepare(shop_exercise()).await.unwrap();
    assert_eq!(outcome, LoadOutcome::UpToDate);
    assert_eq!(sandbox.metrics().snapshot().statements, statements);

    let count = sandbox.submit("SELECT COUNT(*) AS n FROM orders").await.unwrap();
    assert_eq!(count.table().unwrap().first_value(), Some(&json!(3)));
}

#[tokio::test(flavor = "current_thread")]
async fn test_changed_definition_starts_fresh_state() {
    let (sandbox, _) = seeded_sql_sandbox().await;
    let first = sandbox.signature_for(&shop_exercise());

    let extended = shop_exercise().with_global_sql("CREATE TABLE regions (name VARCHAR);");
    let second = sandbox.signature_for(&extended);
    assert_ne!(second, first);

    let outcome = sandbox.prepare(extended).await.unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(
        report.tables,
        vec!["customers", "orders", "products", "regions"]
    );
    // Existing tables are found in the catalog instead of being recreated.
    assert!(report.skipped >= 2);
    assert_eq!(sandbox.loader().active_signature().await, Some(second));
}

#[tokio::test(flavor = "current_thread")]
async fn test_interpreter_exercise_without_sql_skips_engine() {
    let sandbox = sandbox();
    let outcome = sandbox
        .prepare(ExerciseInput::new(ExerciseKind::Python).with_dataset(customers_csv_dataset()))
        .await
        .unwrap();
    assert_eq!(outcome, LoadOutcome::NotRequired);
    assert_eq!(sandbox.sql_session().state(), SessionState::Uninitialized);
    assert_eq!(sandbox.interpreter_session().state(), SessionState::Ready);
}

#[tokio::test(flavor = "current_thread")]
async fn test_interpreter_exercise_with_global_sql_seeds_engine() {
    let sandbox = sandbox();
    let outcome = sandbox
        .prepare(
            ExerciseInput::new(ExerciseKind::Statistics)
                .with_global_sql("CREATE TABLE scores (v INT); INSERT INTO scores VALUES (1), (2);"),
        )
        .await
        .unwrap();
    assert_eq!(outcome.report().unwrap().tables, vec!["scores"]);
    assert!(sandbox.sql_session().is_ready());
    assert!(sandbox.interpreter_session().is_ready());
}

#[tokio::test(flavor = "current_thread")]
async fn test_failed_statement_surfaces_and_retry_resumes() {
    let sandbox = sandbox();
    let broken = ExerciseInput::new(ExerciseKind::Sql).with_global_sql(
        "CREATE TABLE a (x INT);\nINSERT INTO a VALUES (1);\nINSERT INTO b VALUES (1);",
    );

    let err = sandbox.prepare(broken.clone()).await.unwrap_err();
    match &err {
        Error::StatementExecution { statement, message } => {
            assert_eq!(statement, "INSERT INTO b VALUES (1)");
            assert_eq!(err.user_message(), *message);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    sandbox.submit("CREATE TABLE b (x INT)").await.unwrap();
    let outcome = sandbox.prepare(broken).await.unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(report.skipped, 2);

    let a = sandbox.submit("SELECT COUNT(*) FROM a").await.unwrap();
    assert_eq!(a.table().unwrap().first_value(), Some(&json!(1)));
}

#[tokio::test(flavor = "current_thread")]
async fn test_overlapping_prepares_end_on_latest_definition() {
    let (sandbox, _) = seeded_sql_sandbox().await;
    let first = ExerciseInput::new(ExerciseKind::Sql).with_global_sql("CREATE TABLE first_t (x INT);");
    let second =
        ExerciseInput::new(ExerciseKind::Sql).with_global_sql("CREATE TABLE second_t (x INT);");

    let (a, b) = tokio::join!(sandbox.prepare(first), sandbox.prepare(second));
    let outcomes = [a.unwrap(), b.unwrap()];
    assert!(
        outcomes
            .iter()
            .any(|o| matches!(o, LoadOutcome::Completed(_)))
    );
    assert!(!sandbox.loader().is_loading());

    let tables = sandbox
        .submit("SELECT table_name FROM information_schema.tables WHERE table_name = 'second_t'")
        .await
        .unwrap();
    assert_eq!(tables.table().unwrap().row_count, 1);
}
