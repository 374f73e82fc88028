use std::sync::Arc;

use prepbox::{Dataset, ExerciseInput, ExerciseKind, Sandbox, SandboxConfig};

use crate::common::*;

fn numbers_csv(rows: usize) -> String {
    let mut csv = String::from("n,label\n");
    for i in 1..=rows {
        csv.push_str(&format!("{},row {}\n", i, i));
    }
    csv
}

#[tokio::test(flavor = "current_thread")]
async fn test_preview_reports_true_row_count() {
    let (sandbox, sink) = recording_sandbox();
    let exercise = ExerciseInput::new(ExerciseKind::Sql)
        .with_dataset(Dataset::new("numbers", "Numbers").with_csv(numbers_csv(12)));
    sandbox.prepare(exercise).await.unwrap();

    assert_eq!(sink.last_table_list(), Some(vec!["numbers".to_string()]));
    let previews = sink.last_previews().unwrap();
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0].table_name, "numbers");
    assert_eq!(previews[0].columns, vec!["n", "label"]);
    assert_eq!(previews[0].rows.len(), 5);
    assert_eq!(previews[0].row_count, 12);
}

#[tokio::test(flavor = "current_thread")]
async fn test_unchanged_state_is_not_reemitted() {
    let (sandbox, sink) = recording_sandbox();
    sandbox.prepare(shop_exercise()).await.unwrap();
    sandbox.prepare(shop_exercise()).await.unwrap();

    assert_eq!(sink.preview_emissions().len(), 1);
    assert_eq!(sink.table_list_emissions().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn test_definition_change_clears_then_republishes() {
    let (sandbox, sink) = recording_sandbox();
    sandbox.prepare(shop_exercise()).await.unwrap();
    sandbox
        .prepare(shop_exercise().with_global_sql("CREATE TABLE regions (name VARCHAR)"))
        .await
        .unwrap();

    let lists = sink.table_list_emissions();
    assert_eq!(lists.len(), 3);
    assert!(lists[1].is_empty());
    assert!(lists[2].contains(&"regions".to_string()));

    let previews = sink.preview_emissions();
    assert_eq!(previews.len(), 3);
    assert!(previews[1].is_empty());
    assert_eq!(previews[2].len(), 4);
}

#[tokio::test(flavor = "current_thread")]
async fn test_failed_load_clears_previews() {
    let (sandbox, sink) = recording_sandbox();
    sandbox.prepare(shop_exercise()).await.unwrap();
    let err = sandbox
        .prepare(shop_exercise().with_global_sql("INSERT INTO nowhere VALUES (1)"))
        .await;
    assert!(err.is_err());

    assert_eq!(sink.last_previews(), Some(Vec::new()));
    assert_eq!(sink.last_table_list(), Some(Vec::new()));
}

#[tokio::test(flavor = "current_thread")]
async fn test_row_limit_comes_from_config() {
    let sink = RecordingSink::new();
    let config = SandboxConfig::from_toml_str("preview_row_limit = 2").unwrap();
    let sandbox = Sandbox::with_backend(config, sink.clone(), Arc::new(ScriptedInterpreter::new()))
        .unwrap();
    sandbox
        .prepare(
            ExerciseInput::new(ExerciseKind::Sql)
                .with_dataset(Dataset::new("numbers", "Numbers").with_csv(numbers_csv(4))),
        )
        .await
        .unwrap();

    let previews = sink.last_previews().unwrap();
    assert_eq!(previews[0].rows.len(), 2);
    assert_eq!(previews[0].row_count, 4);
}
