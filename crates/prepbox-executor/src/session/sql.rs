use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use prepbox_common::error::{Error, Result};
use prepbox_common::{EngineKind, QueryResult, SandboxConfig, SessionState};
use tracing::{debug, instrument};

use super::{EngineSession, Lifecycle};
use crate::engine::DataFusionEngine;
use crate::metrics::ExecutionMetrics;

const VERIFY_SQL: &str = "SELECT 1";

/// Session over the analytical SQL engine.
pub struct SqlSession {
    lifecycle: Lifecycle,
    engine: Mutex<Option<Arc<DataFusionEngine>>>,
    metrics: Arc<ExecutionMetrics>,
}

impl SqlSession {
    pub fn new(init_timeout: Duration, metrics: Arc<ExecutionMetrics>) -> Self {
        Self {
            lifecycle: Lifecycle::new(EngineKind::Sql, init_timeout),
            engine: Mutex::new(None),
            metrics,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        let metrics = ExecutionMetrics::new(config.slow_statement_threshold());
        Self::new(config.init_timeout(), Arc::new(metrics))
    }

    pub fn metrics(&self) -> &Arc<ExecutionMetrics> {
        &self.metrics
    }

    /// The live engine, or `EngineNotReady`.
    pub fn engine(&self) -> Result<Arc<DataFusionEngine>> {
        self.lifecycle.ensure_ready()?;
        self.engine
            .lock()
            .clone()
            .ok_or_else(|| Error::engine_not_ready(EngineKind::Sql, self.lifecycle.state()))
    }

    /// Run one statement. Fails before the first suspension point when the
    /// session is not ready.
    pub async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let engine = self.engine()?;
        engine.query(sql).await
    }
}

impl Default for SqlSession {
    fn default() -> Self {
        Self::from_config(&SandboxConfig::default())
    }
}

#[async_trait]
impl EngineSession for SqlSession {
    fn kind(&self) -> EngineKind {
        EngineKind::Sql
    }

    fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    #[instrument(skip(self))]
    async fn init(&self) -> Result<()> {
        self.lifecycle
            .init_with(async {
                let engine = DataFusionEngine::with_metrics(Arc::clone(&self.metrics));
                engine
                    .execute_sql(VERIFY_SQL)
                    .await
                    .map_err(|e| Error::engine_initialization(e.to_string()))?;
                *self.engine.lock() = Some(Arc::new(engine));
                Ok(())
            })
            .await
    }

    fn retry(&self) {
        self.lifecycle.retry();
    }

    async fn shutdown(&self) {
        debug!("shutting down sql engine");
        self.engine.lock().take();
        self.lifecycle.reset();
    }
}
