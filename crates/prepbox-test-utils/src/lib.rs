#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use prepbox::{
    CapturedOutput, Dataset, Error, InterpreterBackend, JsonRow, JsonValue, NullSink,
    PreviewSink, Result, Sandbox, SandboxConfig, TablePreview,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn row(value: JsonValue) -> JsonRow {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub fn rows(values: Vec<JsonValue>) -> Vec<JsonRow> {
    values.into_iter().map(row).collect()
}

/// Orders seeded by a fenced, commented creation script with its own inserts.
pub fn orders_dataset() -> Dataset {
    Dataset::new("orders", "Orders").with_creation_sql(
        "```sql\n\
         -- orders placed last week\n\
         CREATE TABLE orders (order_id INT, customer_id INT, amount DOUBLE);\n\
         INSERT INTO orders VALUES (1, 1, 25.0);\n\
         INSERT INTO orders VALUES (2, 1, 40.5);\n\
         INSERT INTO orders VALUES (3, 2, 12.0);\n\
         /* keep in sync with customers */\n\
         ```",
    )
}

/// Customers given only as CSV text.
pub fn customers_csv_dataset() -> Dataset {
    Dataset::new("customers", "Customers").with_csv(
        "customer_id,name,vip\n\
         1,\"Lovelace, Ada\",true\n\
         2,Grace Hopper,false\n",
    )
}

/// Products created by DDL only; rows come from `data`.
pub fn products_dataset() -> Dataset {
    Dataset::new("products", "Products")
        .with_table_name("products")
        .with_columns(["sku", "price"])
        .with_creation_sql("CREATE TABLE products (sku VARCHAR, price DOUBLE)")
        .with_rows(rows(vec![
            serde_json::json!({"sku": "A-1", "price": 9.99}),
            serde_json::json!({"sku": "B-2", "price": 19.5}),
        ]))
}

pub fn sandbox() -> Sandbox {
    sandbox_with(Arc::new(NullSink), Arc::new(ScriptedInterpreter::new()))
}

pub fn sandbox_with(sink: Arc<dyn PreviewSink>, backend: Arc<dyn InterpreterBackend>) -> Sandbox {
    Sandbox::with_backend(SandboxConfig::default(), sink, backend)
        .expect("default config is valid")
}

/// Interpreter backend that answers from a table of canned outputs.
///
/// Unknown code echoes back on stdout.
#[derive(Default)]
pub struct ScriptedInterpreter {
    responses: Mutex<HashMap<String, Result<CapturedOutput>>>,
    start_failure: Option<String>,
    start_delay: Option<Duration>,
    starts: AtomicUsize,
    runs: AtomicUsize,
}

impl ScriptedInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_start(message: impl Into<String>) -> Self {
        Self {
            start_failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    pub fn respond(self, code: impl Into<String>, output: CapturedOutput) -> Self {
        self.responses.lock().insert(code.into(), Ok(output));
        self
    }

    pub fn fail(self, code: impl Into<String>, error: Error) -> Self {
        self.responses.lock().insert(code.into(), Err(error));
        self
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl InterpreterBackend for ScriptedInterpreter {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.start_delay {
            std::thread::sleep(delay);
        }
        match &self.start_failure {
            Some(message) => Err(Error::engine_initialization(message.clone())),
            None => Ok(()),
        }
    }

    fn run(&self, code: &str) -> Result<CapturedOutput> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().get(code) {
            Some(response) => response.clone(),
            None => Ok(CapturedOutput::stdout(code)),
        }
    }
}

/// Sink that keeps every emission for later inspection.
#[derive(Default)]
pub struct RecordingSink {
    previews: Mutex<Vec<Vec<TablePreview>>>,
    table_lists: Mutex<Vec<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn preview_emissions(&self) -> Vec<Vec<TablePreview>> {
        self.previews.lock().clone()
    }

    pub fn table_list_emissions(&self) -> Vec<Vec<String>> {
        self.table_lists.lock().clone()
    }

    pub fn last_previews(&self) -> Option<Vec<TablePreview>> {
        self.previews.lock().last().cloned()
    }

    pub fn last_table_list(&self) -> Option<Vec<String>> {
        self.table_lists.lock().last().cloned()
    }
}

impl PreviewSink for RecordingSink {
    fn table_previews(&self, previews: &[TablePreview]) {
        self.previews.lock().push(previews.to_vec());
    }

    fn table_list(&self, tables: &[String]) {
        self.table_lists.lock().push(tables.to_vec());
    }
}

pub fn assert_error_contains<T: std::fmt::Debug>(result: Result<T>, keywords: &[&str]) {
    match result {
        Ok(value) => panic!("Expected error but got Ok result: {:?}", value),
        Err(e) => {
            let error_msg = e.to_string().to_lowercase();
            let found = keywords
                .iter()
                .any(|keyword| error_msg.contains(&keyword.to_lowercase()));
            assert!(
                found,
                "Error message '{}' does not contain any of the expected keywords: {:?}",
                e, keywords
            );
        }
    }
}

/// Column values of a query result as JSON, in row order.
pub fn column_values(result: &prepbox::QueryResult, column: &str) -> Vec<JsonValue> {
    let idx = result
        .columns
        .iter()
        .position(|c| c == column)
        .unwrap_or_else(|| panic!("column {} not in {:?}", column, result.columns));
    result.rows.iter().map(|r| r[idx].clone()).collect()
}
