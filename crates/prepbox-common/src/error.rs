use thiserror::Error;

use crate::types::{EngineKind, SessionState};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    #[error("{message}")]
    StatementExecution { statement: String, message: String },

    #[error("{engine} engine is not ready (state: {state})")]
    EngineNotReady {
        engine: EngineKind,
        state: SessionState,
    },

    #[error("Engine initialization failed: {0}")]
    EngineInitialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

const RELOAD_MESSAGE: &str = "The code runner failed to start. Reload the page to try again.";

impl Error {
    pub fn parse_failure(msg: impl Into<String>) -> Self {
        Error::ParseFailure(msg.into())
    }

    pub fn statement_execution(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StatementExecution {
            statement: statement.into(),
            message: message.into(),
        }
    }

    pub fn engine_not_ready(engine: EngineKind, state: SessionState) -> Self {
        Error::EngineNotReady { engine, state }
    }

    pub fn engine_initialization(msg: impl Into<String>) -> Self {
        Error::EngineInitialization(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Text suitable for showing to a learner.
    ///
    /// Runtime errors are passed through verbatim; initialization failures are
    /// replaced by a generic reload hint so engine internals stay hidden.
    pub fn user_message(&self) -> String {
        match self {
            Error::EngineInitialization(_) => RELOAD_MESSAGE.to_string(),
            Error::StatementExecution { message, .. } => message.clone(),
            Error::ParseFailure(_)
            | Error::EngineNotReady { .. }
            | Error::Config(_)
            | Error::Internal(_) => self.to_string(),
        }
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, Error::EngineNotReady { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ParseFailure(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
