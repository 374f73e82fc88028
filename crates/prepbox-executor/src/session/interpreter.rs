use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prepbox_common::error::{Error, Result};
use prepbox_common::{EngineKind, InterpreterConfig, SandboxConfig, SessionState};
use tracing::{debug, instrument};

use super::{EngineSession, Lifecycle};

/// Text a program wrote while it ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stdout: text.into(),
            stderr: String::new(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: text.into(),
        }
    }
}

/// A general-purpose interpreter the session can drive.
///
/// Both methods block; the session moves them off the async runtime.
pub trait InterpreterBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn start(&self) -> Result<()>;

    /// Run `code`, capturing its output. Exceptions raised by the program
    /// belong in `stderr`; `Err` is reserved for the runner itself failing
    /// (oversized input, timeout, a crashed worker).
    fn run(&self, code: &str) -> Result<CapturedOutput>;

    fn stop(&self) {}
}

/// Stand-in used when no interpreter is compiled in. Never starts.
#[derive(Debug, Default)]
pub struct UnavailableBackend;

impl InterpreterBackend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn start(&self) -> Result<()> {
        Err(Error::engine_initialization(
            "no interpreter is available in this build (enable the `python` feature)",
        ))
    }

    fn run(&self, _code: &str) -> Result<CapturedOutput> {
        Err(Error::engine_initialization("no interpreter is available in this build"))
    }
}

#[cfg(feature = "python")]
pub fn default_backend(config: &InterpreterConfig) -> Arc<dyn InterpreterBackend> {
    Arc::new(crate::python::PythonBackend::new(config))
}

#[cfg(not(feature = "python"))]
pub fn default_backend(_config: &InterpreterConfig) -> Arc<dyn InterpreterBackend> {
    Arc::new(UnavailableBackend)
}

/// Session over a general-purpose interpreter.
pub struct InterpreterSession {
    lifecycle: Lifecycle,
    backend: Arc<dyn InterpreterBackend>,
}

impl InterpreterSession {
    pub fn new(backend: Arc<dyn InterpreterBackend>, init_timeout: Duration) -> Self {
        Self {
            lifecycle: Lifecycle::new(EngineKind::Interpreter, init_timeout),
            backend,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(default_backend(&config.interpreter), config.init_timeout())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run a program. Fails before the first suspension point when the
    /// session is not ready.
    pub async fn execute(&self, code: &str) -> Result<CapturedOutput> {
        self.lifecycle.ensure_ready()?;
        let backend = Arc::clone(&self.backend);
        let code = code.to_string();
        tokio::task::spawn_blocking(move || backend.run(&code))
            .await
            .map_err(|e| Error::internal(format!("interpreter worker failed: {}", e)))?
    }
}

#[async_trait]
impl EngineSession for InterpreterSession {
    fn kind(&self) -> EngineKind {
        EngineKind::Interpreter
    }

    fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    #[instrument(skip(self), fields(backend = self.backend.name()))]
    async fn init(&self) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        self.lifecycle
            .init_with(async move {
                tokio::task::spawn_blocking(move || backend.start())
                    .await
                    .map_err(|e| Error::engine_initialization(e.to_string()))?
            })
            .await
    }

    fn retry(&self) {
        self.lifecycle.retry();
    }

    async fn shutdown(&self) {
        debug!(backend = self.backend.name(), "shutting down interpreter");
        let backend = Arc::clone(&self.backend);
        if let Err(e) = tokio::task::spawn_blocking(move || backend.stop()).await {
            debug!(error = %e, "interpreter stop task failed");
        }
        self.lifecycle.reset();
    }
}
