use std::sync::Arc;

use prepbox::{ExerciseInput, ExerciseKind, LoadOutcome, LoadReport, Sandbox};
pub use prepbox_test_utils::*;

/// SQL sandbox seeded with orders (script), customers (CSV) and products
/// (DDL plus rows).
pub async fn seeded_sql_sandbox() -> (Sandbox, LoadReport) {
    init_test_logging();
    let sandbox = sandbox();
    let outcome = sandbox.prepare(shop_exercise()).await.unwrap();
    let report = match outcome {
        LoadOutcome::Completed(report) => report,
        other => panic!("expected a completed load, got {:?}", other),
    };
    (sandbox, report)
}

pub fn shop_exercise() -> ExerciseInput {
    ExerciseInput::new(ExerciseKind::Sql).with_datasets([
        orders_dataset(),
        customers_csv_dataset(),
        products_dataset(),
    ])
}

pub fn recording_sandbox() -> (Sandbox, Arc<RecordingSink>) {
    init_test_logging();
    let sink = RecordingSink::new();
    let sandbox = sandbox_with(sink.clone(), Arc::new(ScriptedInterpreter::new()));
    (sandbox, sink)
}
