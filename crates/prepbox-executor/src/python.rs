//! CPython backend, embedded through PyO3.
//!
//! Each submission runs on its own worker thread, bounded by a wall-clock
//! timeout. A worker that overruns is abandoned, not killed: CPython offers no
//! safe way to stop a thread, so the timeout only bounds how long the caller
//! waits. Learner globals persist between submissions until the backend is
//! stopped.

use std::ffi::CString;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use prepbox_common::InterpreterConfig;
use prepbox_common::error::{Error, Result};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use tracing::{debug, warn};

use crate::session::{CapturedOutput, InterpreterBackend};

const VERIFY_CODE: &str = "print(\"Python engine verified\")";
const VERIFY_OUTPUT: &str = "Python engine verified";

const HARNESS: &str = r#"
import sys
import traceback
from io import StringIO

_prepbox_stdout = StringIO()
_prepbox_stderr = StringIO()
_prepbox_saved = (sys.stdout, sys.stderr)
sys.stdout = _prepbox_stdout
sys.stderr = _prepbox_stderr
try:
    exec(compile(_prepbox_source, "<submission>", "exec"), _prepbox_namespace)
except BaseException:
    traceback.print_exc()
finally:
    sys.stdout, sys.stderr = _prepbox_saved

_prepbox_output = _prepbox_stdout.getvalue()
_prepbox_error = _prepbox_stderr.getvalue()
"#;

pub struct PythonBackend {
    timeout: Duration,
    code_size_limit: usize,
    namespace: Mutex<Option<Arc<Py<PyDict>>>>,
}

impl PythonBackend {
    pub fn new(config: &InterpreterConfig) -> Self {
        Self {
            timeout: config.timeout(),
            code_size_limit: config.code_size_limit,
            namespace: Mutex::new(None),
        }
    }

    fn run_with_timeout(&self, code: &str, namespace: Arc<Py<PyDict>>) -> Result<CapturedOutput> {
        let source = code.to_string();
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let result = run_harness(&source, &namespace);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => {
                let _ = handle.join();
                result
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "python execution timed out");
                Err(Error::internal(format!(
                    "Python execution timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::internal("Python execution thread panicked"))
            }
        }
    }
}

impl InterpreterBackend for PythonBackend {
    fn name(&self) -> &'static str {
        "python"
    }

    fn start(&self) -> Result<()> {
        let namespace = Arc::new(Python::attach(|py| PyDict::new(py).unbind()));
        let captured = self
            .run_with_timeout(VERIFY_CODE, Arc::clone(&namespace))
            .map_err(|e| Error::engine_initialization(e.to_string()))?;
        if captured.stdout.trim() != VERIFY_OUTPUT {
            return Err(Error::engine_initialization(format!(
                "unexpected verification output: {:?} / {:?}",
                captured.stdout, captured.stderr
            )));
        }
        debug!("python engine verified");
        *self.namespace.lock() = Some(namespace);
        Ok(())
    }

    fn run(&self, code: &str) -> Result<CapturedOutput> {
        if code.len() > self.code_size_limit {
            return Err(Error::internal(format!(
                "Python code size {} exceeds limit of {} bytes",
                code.len(),
                self.code_size_limit
            )));
        }
        let namespace = self
            .namespace
            .lock()
            .clone()
            .ok_or_else(|| Error::internal("Python runtime not started"))?;
        self.run_with_timeout(code, namespace)
    }

    fn stop(&self) {
        self.namespace.lock().take();
    }
}

fn run_harness(source: &str, namespace: &Py<PyDict>) -> Result<CapturedOutput> {
    Python::attach(|py| {
        let globals = PyDict::new(py);
        globals
            .set_item("_prepbox_source", source)
            .map_err(|e| Error::internal(format!("Failed to set source: {}", e)))?;
        globals
            .set_item("_prepbox_namespace", namespace.bind(py))
            .map_err(|e| Error::internal(format!("Failed to set namespace: {}", e)))?;

        let harness =
            CString::new(HARNESS).map_err(|e| Error::internal(format!("Invalid harness: {}", e)))?;
        py.run(&harness, Some(&globals), None)
            .map_err(|e| Error::internal(format!("Python harness error: {}", e)))?;

        Ok(CapturedOutput {
            stdout: captured_text(&globals, "_prepbox_output")?,
            stderr: captured_text(&globals, "_prepbox_error")?,
        })
    })
}

fn captured_text(globals: &Bound<'_, PyDict>, key: &str) -> Result<String> {
    match globals
        .get_item(key)
        .map_err(|e| Error::internal(format!("Failed to read {}: {}", key, e)))?
    {
        Some(value) => value
            .extract::<String>()
            .map_err(|e| Error::internal(format!("Failed to read {}: {}", key, e))),
        None => Ok(String::new()),
    }
}
