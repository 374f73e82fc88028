use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// JSON cell value as it travels between datasets, engines and the host.
pub type JsonValue = serde_json::Value;

/// A row object keyed by column name, in column order.
pub type JsonRow = serde_json::Map<String, JsonValue>;

/// Which runtime a piece of code is executed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Sql,
    Interpreter,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Sql => "sql",
            EngineKind::Interpreter => "interpreter",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one embedded runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Loading,
    Ready,
    Failed(String),
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SessionState::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => f.write_str("uninitialized"),
            SessionState::Loading => f.write_str("loading"),
            SessionState::Ready => f.write_str("ready"),
            SessionState::Failed(_) => f.write_str("failed"),
        }
    }
}

/// The kind of practice question a learner is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Sql,
    Python,
    GoogleSheets,
    Statistics,
    PowerBi,
    Reasoning,
    Math,
    ProblemSolving,
    Geometry,
    Coding,
    Programming,
    Javascript,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ExerciseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::Sql => "sql",
            ExerciseKind::Python => "python",
            ExerciseKind::GoogleSheets => "google_sheets",
            ExerciseKind::Statistics => "statistics",
            ExerciseKind::PowerBi => "power_bi",
            ExerciseKind::Reasoning => "reasoning",
            ExerciseKind::Math => "math",
            ExerciseKind::ProblemSolving => "problem_solving",
            ExerciseKind::Geometry => "geometry",
            ExerciseKind::Coding => "coding",
            ExerciseKind::Programming => "programming",
            ExerciseKind::Javascript => "javascript",
            ExerciseKind::Unknown => "unknown",
        }
    }

    /// Only SQL exercises run on the analytical engine; everything else is
    /// handed to the interpreter.
    pub fn engine_kind(&self) -> EngineKind {
        match self {
            ExerciseKind::Sql => EngineKind::Sql,
            ExerciseKind::Python
            | ExerciseKind::GoogleSheets
            | ExerciseKind::Statistics
            | ExerciseKind::PowerBi
            | ExerciseKind::Reasoning
            | ExerciseKind::Math
            | ExerciseKind::ProblemSolving
            | ExerciseKind::Geometry
            | ExerciseKind::Coding
            | ExerciseKind::Programming
            | ExerciseKind::Javascript
            | ExerciseKind::Unknown => EngineKind::Interpreter,
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "sql" => ExerciseKind::Sql,
            "python" => ExerciseKind::Python,
            "google_sheets" => ExerciseKind::GoogleSheets,
            "statistics" => ExerciseKind::Statistics,
            "power_bi" => ExerciseKind::PowerBi,
            "reasoning" => ExerciseKind::Reasoning,
            "math" => ExerciseKind::Math,
            "problem_solving" => ExerciseKind::ProblemSolving,
            "geometry" => ExerciseKind::Geometry,
            "coding" => ExerciseKind::Coding,
            "programming" => ExerciseKind::Programming,
            "javascript" => ExerciseKind::Javascript,
            _ => ExerciseKind::Unknown,
        };
        Ok(kind)
    }
}
