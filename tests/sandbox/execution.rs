use std::sync::Arc;

use prepbox::{
    CapturedOutput, Error, ExecutionResult, ExerciseInput, ExerciseKind, NullSink,
};
use serde_json::json;

use crate::common::*;

#[tokio::test(flavor = "current_thread")]
async fn test_sql_result_serializes_with_table_shape() {
    let (sandbox, _) = seeded_sql_sandbox().await;
    let result = sandbox
        .submit("SELECT order_id, amount FROM orders WHERE order_id = 2")
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({
            "success": true,
            "result": {
                "columns": ["order_id", "amount"],
                "rows": [[2, 40.5]],
                "rowCount": 1
            }
        })
    );
}

#[tokio::test(flavor = "current_thread")]
async fn test_sql_error_is_a_failure_result() {
    let (sandbox, _) = seeded_sql_sandbox().await;
    let result = sandbox.submit("SELECT * FROM no_such_table").await.unwrap();

    let error = result.error().unwrap().to_string();
    assert!(error.contains("no_such_table"));
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"success": false, "error": error})
    );
}

#[tokio::test(flavor = "current_thread")]
async fn test_nulls_and_empty_results() {
    let (sandbox, _) = seeded_sql_sandbox().await;
    let result = sandbox
        .submit("SELECT CAST(NULL AS INT) AS missing, 'x' AS present")
        .await
        .unwrap();
    assert_eq!(result.table().unwrap().rows, vec![vec![json!(null), json!("x")]]);

    let empty = sandbox
        .submit("SELECT * FROM orders WHERE amount < 0")
        .await
        .unwrap();
    let table = empty.table().unwrap();
    assert_eq!(table.columns, vec!["order_id", "customer_id", "amount"]);
    assert!(table.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn test_submit_before_prepare_fails_fast() {
    let sandbox = sandbox();
    let err = sandbox.submit("print(1)").await.unwrap_err();
    assert!(err.is_not_ready());

    sandbox
        .prepare(ExerciseInput::new(ExerciseKind::Python))
        .await
        .unwrap();
    let err = sandbox.sql_session().execute("SELECT 1").await.unwrap_err();
    assert!(err.is_not_ready());
}

#[tokio::test(flavor = "current_thread")]
async fn test_interpreter_results_are_normalized() {
    let backend = ScriptedInterpreter::new()
        .respond("print('hi')", CapturedOutput::stdout("hi\n"))
        .respond(
            "1/0",
            CapturedOutput {
                stdout: "partial\n".into(),
                stderr: "Traceback (most recent call last):\nZeroDivisionError: division by zero\n"
                    .into(),
            },
        )
        .fail(
            "while True: pass",
            Error::internal("Python execution timed out after 5000ms"),
        );
    let sandbox = sandbox_with(Arc::new(NullSink), Arc::new(backend));
    sandbox
        .prepare(ExerciseInput::new(ExerciseKind::Python))
        .await
        .unwrap();

    assert_eq!(
        sandbox.submit("print('hi')").await.unwrap(),
        ExecutionResult::Output("hi".into())
    );

    let failure = sandbox.submit("1/0").await.unwrap();
    assert!(!failure.is_success());
    assert!(failure.error().unwrap().ends_with("ZeroDivisionError: division by zero"));
    assert_eq!(
        serde_json::to_value(&failure).unwrap()["success"],
        json!(false)
    );

    let timeout = sandbox.submit("while True: pass").await.unwrap();
    assert!(timeout.error().unwrap().contains("timed out"));
}

#[tokio::test(flavor = "current_thread")]
async fn test_exercise_kind_picks_engine() {
    let (sandbox, _) = seeded_sql_sandbox().await;
    assert!(sandbox.submit("SELECT 1").await.unwrap().table().is_some());

    sandbox
        .prepare(ExerciseInput::new(ExerciseKind::Coding))
        .await
        .unwrap();
    assert_eq!(
        sandbox.submit("SELECT 1").await.unwrap(),
        ExecutionResult::Output("SELECT 1".into())
    );
}
