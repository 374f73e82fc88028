use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sandbox configuration.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Rows shown per table preview (default: 5)
    #[serde(default = "default_preview_row_limit")]
    pub preview_row_limit: usize,

    /// Characters kept from each sample that feeds the load signature (default: 160)
    #[serde(default = "default_signature_sample_limit")]
    pub signature_sample_limit: usize,

    /// Upper bound for bringing an engine to `Ready` (default: 60s)
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,

    /// Statements slower than this are logged and counted (default: 1s)
    #[serde(default = "default_slow_statement_threshold_ms")]
    pub slow_statement_threshold_ms: u64,

    #[serde(default)]
    pub interpreter: InterpreterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Wall-clock limit for one submission (default: 5s)
    #[serde(default = "default_interpreter_timeout_ms")]
    pub timeout_ms: u64,

    /// Largest accepted source text in bytes (default: 1MB)
    #[serde(default = "default_code_size_limit")]
    pub code_size_limit: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            preview_row_limit: default_preview_row_limit(),
            signature_sample_limit: default_signature_sample_limit(),
            init_timeout_ms: default_init_timeout_ms(),
            slow_statement_threshold_ms: default_slow_statement_threshold_ms(),
            interpreter: InterpreterConfig::default(),
        }
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_interpreter_timeout_ms(),
            code_size_limit: default_code_size_limit(),
        }
    }
}

impl SandboxConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SandboxConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.preview_row_limit == 0 {
            return Err(Error::config("preview_row_limit must be greater than 0"));
        }
        if self.signature_sample_limit == 0 {
            return Err(Error::config(
                "signature_sample_limit must be greater than 0",
            ));
        }
        if self.init_timeout_ms == 0 {
            return Err(Error::config("init_timeout_ms must be greater than 0"));
        }
        if self.interpreter.timeout_ms == 0 {
            return Err(Error::config(
                "interpreter.timeout_ms must be greater than 0",
            ));
        }
        if self.interpreter.code_size_limit == 0 {
            return Err(Error::config(
                "interpreter.code_size_limit must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn slow_statement_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_statement_threshold_ms)
    }
}

impl InterpreterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_preview_row_limit() -> usize {
    5
}

fn default_signature_sample_limit() -> usize {
    160
}

fn default_init_timeout_ms() -> u64 {
    60_000
}

fn default_slow_statement_threshold_ms() -> u64 {
    1_000
}

fn default_interpreter_timeout_ms() -> u64 {
    5_000
}

fn default_code_size_limit() -> usize {
    1024 * 1024
}
