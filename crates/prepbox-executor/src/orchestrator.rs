//! Routes submitted code to the session for its engine and normalizes the
//! result into an [`ExecutionResult`].

use std::sync::Arc;

use prepbox_common::error::{Error, Result};
use prepbox_common::{EngineKind, ExecutionResult};
use tracing::{debug, instrument};

use crate::session::{CapturedOutput, InterpreterSession, SqlSession};

pub struct ExecutionOrchestrator {
    sql: Arc<SqlSession>,
    interpreter: Arc<InterpreterSession>,
}

impl ExecutionOrchestrator {
    pub fn new(sql: Arc<SqlSession>, interpreter: Arc<InterpreterSession>) -> Self {
        Self { sql, interpreter }
    }

    /// Run `code` on the session for `kind`.
    ///
    /// Only `EngineNotReady` (and other runner faults of the SQL engine
    /// adapter) come back as `Err`; a statement the engine rejects or a
    /// program that raises is a `Failure` result.
    #[instrument(skip(self, code), fields(engine = %kind, len = code.len()))]
    pub async fn execute(&self, code: &str, kind: EngineKind) -> Result<ExecutionResult> {
        match kind {
            EngineKind::Sql => self.execute_sql(code).await,
            EngineKind::Interpreter => self.execute_interpreter(code).await,
        }
    }

    async fn execute_sql(&self, code: &str) -> Result<ExecutionResult> {
        match self.sql.execute(code).await {
            Ok(result) => Ok(ExecutionResult::Table(result)),
            Err(Error::StatementExecution { message, .. }) => {
                debug!(error = %message, "statement failed");
                Ok(ExecutionResult::Failure(message))
            }
            Err(e) => Err(e),
        }
    }

    async fn execute_interpreter(&self, code: &str) -> Result<ExecutionResult> {
        match self.interpreter.execute(code).await {
            Ok(captured) => Ok(normalize_output(captured)),
            Err(e) if e.is_not_ready() => Err(e),
            Err(e) => {
                debug!(error = %e, "interpreter run failed");
                Ok(ExecutionResult::Failure(e.to_string()))
            }
        }
    }
}

/// Anything on stderr makes the run a failure; otherwise stdout is the output.
pub fn normalize_output(captured: CapturedOutput) -> ExecutionResult {
    let stderr = captured.stderr.trim();
    if !stderr.is_empty() {
        return ExecutionResult::Failure(stderr.to_string());
    }
    ExecutionResult::Output(captured.stdout.trim().to_string())
}
