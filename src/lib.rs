//! prepbox - an embedded code-execution sandbox for practice exercises.
//!
//! A [`Sandbox`] owns one SQL session (Apache DataFusion) and one interpreter
//! session, seeds the SQL engine with the exercise's datasets and runs
//! learner submissions on whichever engine the exercise kind calls for.
//!
//! The flow for one exercise is:
//! ```text
//! datasets + kind → SignatureBuilder → DatasetLoader → SqlSession → PreviewPublisher → sink
//! submitted code → ExecutionOrchestrator → ExecutionResult
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prepbox::{Dataset, ExerciseInput, ExerciseKind, NullSink, Sandbox, SandboxConfig};
//!
//! #[tokio::main]
//! async fn main() -> prepbox::Result<()> {
//!     let sandbox = Sandbox::new(SandboxConfig::default(), Arc::new(NullSink))?;
//!     let orders = Dataset::new("orders", "Orders").with_csv("id,amount\n1,10\n2,20\n");
//!     sandbox
//!         .prepare(ExerciseInput::new(ExerciseKind::Sql).with_dataset(orders))
//!         .await?;
//!
//!     let result = sandbox.submit("SELECT SUM(amount) FROM orders").await?;
//!     println!("{}", serde_json::to_string(&result).unwrap());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info};

pub use prepbox_common::error::{Error, Result};
pub use prepbox_common::{
    Dataset, EngineKind, ExecutionResult, ExerciseKind, InterpreterConfig, JsonRow, JsonValue,
    QueryResult, SandboxConfig, SessionState, TablePreview,
};
pub use prepbox_executor::{
    CapturedOutput, DataFusionEngine, DatasetLoader, EngineSession, ExecutionMetrics,
    ExecutionOrchestrator, InterpreterBackend, InterpreterSession, LoadOutcome, LoadReport,
    LoadRequest, LoadState, MetricsSnapshot, NullSink, PreviewPublisher, PreviewSink,
    SqlSession, UnavailableBackend,
};
pub use prepbox_sql::{LoadSignature, SignatureBuilder, split_statements};

/// Everything the sandbox needs to know about the exercise on screen.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExerciseInput {
    #[serde(alias = "exercise_type")]
    pub kind: ExerciseKind,
    pub datasets: Vec<Dataset>,
    #[serde(alias = "data_creation_sql")]
    pub global_sql: Option<String>,
}

impl ExerciseInput {
    pub fn new(kind: ExerciseKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.datasets.push(dataset);
        self
    }

    pub fn with_datasets(mut self, datasets: impl IntoIterator<Item = Dataset>) -> Self {
        self.datasets.extend(datasets);
        self
    }

    pub fn with_global_sql(mut self, sql: impl Into<String>) -> Self {
        self.global_sql = Some(sql.into());
        self
    }

    /// Whether the SQL engine has to be brought up and seeded: always for SQL
    /// exercises, otherwise only when there is SQL to run or a named table to
    /// fill.
    pub fn needs_sql_seed(&self) -> bool {
        self.kind.engine_kind() == EngineKind::Sql
            || self
                .global_sql
                .as_deref()
                .is_some_and(|sql| !sql.trim().is_empty())
            || self.datasets.iter().any(|dataset| {
                dataset.creation_script().is_some()
                    || (dataset.data.is_some()
                        && dataset.table_name.as_deref().is_some_and(|t| !t.is_empty()))
            })
    }
}

/// One learner's sandbox: both engine sessions, the dataset loader and the
/// preview publisher.
pub struct Sandbox {
    config: SandboxConfig,
    signatures: SignatureBuilder,
    sql: Arc<SqlSession>,
    interpreter: Arc<InterpreterSession>,
    loader: DatasetLoader,
    orchestrator: ExecutionOrchestrator,
    active_kind: Mutex<ExerciseKind>,
}

impl Sandbox {
    /// Sandbox with the interpreter compiled into this build.
    pub fn new(config: SandboxConfig, sink: Arc<dyn PreviewSink>) -> Result<Self> {
        let backend = prepbox_executor::default_backend(&config.interpreter);
        Self::with_backend(config, sink, backend)
    }

    pub fn with_backend(
        config: SandboxConfig,
        sink: Arc<dyn PreviewSink>,
        backend: Arc<dyn InterpreterBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let sql = Arc::new(SqlSession::from_config(&config));
        let interpreter = Arc::new(InterpreterSession::new(backend, config.init_timeout()));
        let publisher = PreviewPublisher::new(sink, config.preview_row_limit);

        Ok(Self {
            signatures: SignatureBuilder::new(config.signature_sample_limit),
            loader: DatasetLoader::new(publisher),
            orchestrator: ExecutionOrchestrator::new(Arc::clone(&sql), Arc::clone(&interpreter)),
            sql,
            interpreter,
            config,
            active_kind: Mutex::new(ExerciseKind::default()),
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn sql_session(&self) -> &Arc<SqlSession> {
        &self.sql
    }

    pub fn interpreter_session(&self) -> &Arc<InterpreterSession> {
        &self.interpreter
    }

    pub fn loader(&self) -> &DatasetLoader {
        &self.loader
    }

    pub fn metrics(&self) -> &ExecutionMetrics {
        self.sql.metrics()
    }

    pub fn active_kind(&self) -> ExerciseKind {
        *self.active_kind.lock()
    }

    /// Signature `exercise` would load under, without loading anything.
    pub fn signature_for(&self, exercise: &ExerciseInput) -> LoadSignature {
        self.signatures.build(
            &exercise.datasets,
            exercise.global_sql.as_deref(),
            exercise.kind,
        )
    }

    /// Switch to `exercise`: bring up the session its kind runs on and seed
    /// the SQL engine with its datasets when needed.
    ///
    /// Engine initialization failures are returned as-is; the session stays
    /// failed until [`Sandbox::retry`].
    pub async fn prepare(&self, exercise: ExerciseInput) -> Result<LoadOutcome> {
        *self.active_kind.lock() = exercise.kind;
        let engine_kind = exercise.kind.engine_kind();
        info!(kind = %exercise.kind, engine = %engine_kind, datasets = exercise.datasets.len(), "preparing exercise");

        if engine_kind == EngineKind::Interpreter {
            self.interpreter.init().await?;
        }

        if !exercise.needs_sql_seed() {
            debug!("no datasets to seed");
            return Ok(LoadOutcome::NotRequired);
        }

        self.sql.init().await?;
        let engine = match self.sql.engine() {
            Ok(engine) => engine,
            Err(e) if e.is_not_ready() => {
                debug!("sql engine still starting, load deferred");
                return Ok(LoadOutcome::Deferred);
            }
            Err(e) => return Err(e),
        };

        let request = LoadRequest::new(
            exercise.datasets,
            exercise.global_sql,
            exercise.kind,
            &self.signatures,
        );
        self.loader.load(&engine, request).await
    }

    /// Run learner code on the engine of the active exercise.
    pub async fn submit(&self, code: &str) -> Result<ExecutionResult> {
        let engine_kind = self.active_kind().engine_kind();
        self.orchestrator.execute(code, engine_kind).await
    }

    /// Clear failed sessions so the next `prepare` starts them again.
    pub fn retry(&self) {
        self.sql.retry();
        self.interpreter.retry();
    }

    /// Stop any running load, forget loaded state, release both runtimes and
    /// zero the engine counters.
    pub async fn shutdown(&self) {
        info!("shutting down sandbox");
        self.loader.cancel();
        self.loader.forget().await;
        self.sql.shutdown().await;
        self.interpreter.shutdown().await;
        self.sql.metrics().reset();
    }
}
