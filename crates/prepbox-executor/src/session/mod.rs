//! Lifecycle of the embedded runtimes.
//!
//! A session moves `Uninitialized -> Loading -> Ready | Failed`. A failed
//! session stays failed until [`EngineSession::retry`] puts it back to
//! `Uninitialized`; `init()` never retries on its own.

mod interpreter;
mod sql;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use prepbox_common::error::{Error, Result};
use prepbox_common::{EngineKind, SessionState};
use tracing::{error, info, warn};

pub use interpreter::{
    CapturedOutput, InterpreterBackend, InterpreterSession, UnavailableBackend, default_backend,
};
pub use sql::SqlSession;

#[async_trait]
pub trait EngineSession: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn state(&self) -> SessionState;

    fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Bring the runtime up. A call while another is in flight returns
    /// immediately without waiting for it.
    async fn init(&self) -> Result<()>;

    /// Forget a failed initialization so the next `init()` starts over.
    fn retry(&self);

    /// Release the runtime and return to `Uninitialized`.
    async fn shutdown(&self);
}

enum InitStep {
    Start,
    AlreadyReady,
    InFlight,
    Failed(String),
}

/// Returns an abandoned initialization to `Uninitialized`.
struct InitGuard<'a> {
    lifecycle: &'a Lifecycle,
    finished: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(engine = %self.lifecycle.kind, "engine initialization abandoned");
            let mut state = self.lifecycle.state.lock();
            if matches!(*state, SessionState::Loading) {
                *state = SessionState::Uninitialized;
            }
        }
        self.lifecycle.in_flight.store(false, Ordering::Release);
    }
}

/// State shared by both session kinds.
pub(crate) struct Lifecycle {
    kind: EngineKind,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
    init_timeout: Duration,
}

impl Lifecycle {
    pub(crate) fn new(kind: EngineKind, init_timeout: Duration) -> Self {
        Self {
            kind,
            state: Mutex::new(SessionState::Uninitialized),
            in_flight: AtomicBool::new(false),
            init_timeout,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    fn begin(&self) -> InitStep {
        let mut state = self.state.lock();
        match &*state {
            SessionState::Ready => return InitStep::AlreadyReady,
            SessionState::Failed(message) => return InitStep::Failed(message.clone()),
            SessionState::Loading | SessionState::Uninitialized => {}
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return InitStep::InFlight;
        }
        *state = SessionState::Loading;
        InitStep::Start
    }

    /// Drive `start` under the init timeout, recording the outcome.
    pub(crate) async fn init_with<F>(&self, start: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        match self.begin() {
            InitStep::AlreadyReady | InitStep::InFlight => return Ok(()),
            InitStep::Failed(message) => return Err(Error::engine_initialization(message)),
            InitStep::Start => {}
        }
        let mut guard = InitGuard {
            lifecycle: self,
            finished: false,
        };

        info!(engine = %self.kind, "initializing engine");
        let outcome = match tokio::time::timeout(self.init_timeout, start).await {
            Ok(result) => result,
            Err(_) => Err(Error::engine_initialization(format!(
                "{} engine did not start within {}ms",
                self.kind,
                self.init_timeout.as_millis()
            ))),
        };

        {
            let mut state = self.state.lock();
            match &outcome {
                Ok(()) => {
                    info!(engine = %self.kind, "engine ready");
                    *state = SessionState::Ready;
                }
                Err(e) => {
                    error!(engine = %self.kind, error = %e, "engine initialization failed");
                    *state = SessionState::Failed(initialization_message(e));
                }
            }
        }
        guard.finished = true;
        drop(guard);

        outcome.map_err(|e| Error::engine_initialization(initialization_message(&e)))
    }

    /// Fail fast unless the session is ready.
    pub(crate) fn ensure_ready(&self) -> Result<()> {
        let state = self.state.lock();
        if state.is_ready() {
            Ok(())
        } else {
            Err(Error::engine_not_ready(self.kind, state.clone()))
        }
    }

    pub(crate) fn retry(&self) {
        let mut state = self.state.lock();
        if state.is_failed() {
            *state = SessionState::Uninitialized;
        }
    }

    pub(crate) fn reset(&self) {
        *self.state.lock() = SessionState::Uninitialized;
    }
}

fn initialization_message(e: &Error) -> String {
    match e {
        Error::EngineInitialization(message) => message.clone(),
        Error::ParseFailure(_)
        | Error::StatementExecution { .. }
        | Error::EngineNotReady { .. }
        | Error::Config(_)
        | Error::Internal(_) => e.to_string(),
    }
}
