//! Thin adapter over a DataFusion [`SessionContext`].
//!
//! Every round trip goes through [`DataFusionEngine::execute_sql`] so metrics,
//! slow-statement logging and error mapping happen in one place. Tables are
//! registered lower-cased in the default `public` schema, matching how
//! DataFusion folds unquoted identifiers.

use std::sync::Arc;
use std::time::Instant;

use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::TableReference;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use prepbox_common::error::{Error, Result};
use prepbox_common::{JsonRow, QueryResult};
use prepbox_sql::quote_lit;
use tracing::{debug, instrument, warn};

use crate::convert::{batches_to_rows, rows_to_batch};
use crate::metrics::ExecutionMetrics;

const DEFAULT_SCHEMA: &str = "public";

pub struct DataFusionEngine {
    ctx: SessionContext,
    metrics: Arc<ExecutionMetrics>,
}

impl DataFusionEngine {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(ExecutionMetrics::default()))
    }

    pub fn with_metrics(metrics: Arc<ExecutionMetrics>) -> Self {
        let config = SessionConfig::new().with_information_schema(true);
        Self {
            ctx: SessionContext::new_with_config(config),
            metrics,
        }
    }

    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }

    pub fn session_context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Run one statement and collect its output.
    ///
    /// Engine failures come back as `StatementExecution` carrying the
    /// statement text and the engine's own message.
    #[instrument(skip(self, sql), fields(len = sql.len()))]
    pub async fn execute_sql(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let (_, batches) = self.run(sql).await?;
        Ok(batches)
    }

    /// Run one statement and convert the output to JSON cells.
    pub async fn query(&self, sql: &str) -> Result<QueryResult> {
        let (columns, batches) = self.run(sql).await?;
        let rows = batches_to_rows(&batches)?;
        Ok(QueryResult::new(columns, rows))
    }

    async fn run(&self, sql: &str) -> Result<(Vec<String>, Vec<RecordBatch>)> {
        let start = Instant::now();
        let outcome = async {
            let df = self.ctx.sql(sql).await?;
            let columns: Vec<String> = df
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect();
            let batches = df.collect().await?;
            Ok::<_, datafusion::error::DataFusionError>((columns, batches))
        }
        .await;

        let elapsed = start.elapsed();
        if self.metrics.record(elapsed, outcome.is_err()) {
            warn!(elapsed_ms = elapsed.as_millis() as u64, sql, "slow statement");
        }

        outcome.map_err(|e| {
            debug!(error = %e, "statement failed");
            Error::statement_execution(sql, e.to_string())
        })
    }

    /// Actual name of a table in the default schema, matched case-insensitively.
    ///
    /// Qualified references (`schema.table`) are matched on their last part.
    pub async fn resolve_table_name(&self, name: &str) -> Result<Option<String>> {
        let bare = name.rsplit('.').next().unwrap_or(name);
        let sql = format!(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = '{}' AND lower(table_name) = lower({}) \
             ORDER BY table_name",
            DEFAULT_SCHEMA,
            quote_lit(bare)
        );
        let result = self.query(&sql).await?;
        let names = result.first_column_strings();
        Ok(names
            .iter()
            .find(|candidate| candidate.as_str() == bare)
            .or_else(|| names.first())
            .cloned())
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.resolve_table_name(name).await?.is_some())
    }

    /// Live tables in the default schema, sorted by name.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = '{}' ORDER BY table_name",
            DEFAULT_SCHEMA
        );
        Ok(self.query(&sql).await?.first_column_strings())
    }

    /// Map requested column names onto the table's actual column names,
    /// case-insensitively. Unknown names pass through unchanged.
    pub async fn resolve_column_names(&self, table: &str, columns: &[String]) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = '{}' AND table_name = {} \
             ORDER BY ordinal_position",
            DEFAULT_SCHEMA,
            quote_lit(table)
        );
        let actual = self.query(&sql).await?.first_column_strings();
        Ok(columns
            .iter()
            .map(|requested| {
                actual
                    .iter()
                    .find(|a| a.as_str() == requested.as_str())
                    .or_else(|| actual.iter().find(|a| a.eq_ignore_ascii_case(requested)))
                    .cloned()
                    .unwrap_or_else(|| requested.clone())
            })
            .collect())
    }

    pub async fn count_rows(&self, table: &str) -> Result<usize> {
        let sql = format!(
            "SELECT COUNT(*) AS row_count FROM {}",
            prepbox_sql::quote_ident(table)
        );
        let result = self.query(&sql).await?;
        let count = result
            .first_value()
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::internal(format!("COUNT(*) on {} returned no value", table)))?;
        usize::try_from(count).map_err(|e| Error::internal(e.to_string()))
    }

    /// Replace `table` with the given rows, inferring a type per column.
    ///
    /// The table is registered under its lower-cased name.
    pub fn load_rows(&self, table: &str, columns: &[String], rows: &[JsonRow]) -> Result<()> {
        let batch = rows_to_batch(columns, rows)?;
        self.register_batch(table, batch)
    }

    pub fn register_batch(&self, name: &str, batch: RecordBatch) -> Result<()> {
        let lower = name.to_lowercase();
        let start = Instant::now();
        let schema = batch.schema();
        let outcome = MemTable::try_new(schema, vec![vec![batch]]).and_then(|mem_table| {
            let table_ref = TableReference::bare(lower.clone());
            self.ctx.deregister_table(table_ref.clone())?;
            self.ctx.register_table(table_ref, Arc::new(mem_table))
        });
        self.metrics.record(start.elapsed(), outcome.is_err());
        outcome
            .map(|_| ())
            .map_err(|e| Error::statement_execution(format!("LOAD {}", lower), e.to_string()))
    }
}

impl Default for DataFusionEngine {
    fn default() -> Self {
        Self::new()
    }
}
