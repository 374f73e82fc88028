//! Common types, configuration and error handling for prepbox.

pub mod config;
pub mod dataset;
pub mod error;
pub mod result;
pub mod types;

pub use config::{InterpreterConfig, SandboxConfig};
pub use dataset::{Dataset, sanitize_table_name};
pub use error::{Error, Result};
pub use result::{ExecutionResult, QueryResult, TablePreview};
pub use types::{EngineKind, ExerciseKind, JsonRow, JsonValue, SessionState};
