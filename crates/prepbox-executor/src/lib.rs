//! Engine sessions, dataset loading and code execution for prepbox.

mod convert;
mod engine;
pub mod loader;
mod metrics;
mod orchestrator;
pub mod preview;
#[cfg(feature = "python")]
mod python;
pub mod session;

pub use datafusion::arrow::record_batch::RecordBatch;
pub use datafusion::prelude::SessionContext;
pub use engine::DataFusionEngine;
pub use loader::{DatasetLoader, LoadOutcome, LoadReport, LoadRequest, LoadState, LoadStateCache};
pub use metrics::{ExecutionMetrics, MetricsSnapshot};
pub use orchestrator::{ExecutionOrchestrator, normalize_output};
pub use prepbox_common::error::{Error, Result};
pub use preview::{DEFAULT_PREVIEW_ROW_LIMIT, NullSink, PreviewPublisher, PreviewSink};
#[cfg(feature = "python")]
pub use python::PythonBackend;
pub use session::{
    CapturedOutput, EngineSession, InterpreterBackend, InterpreterSession, SqlSession,
    UnavailableBackend, default_backend,
};
