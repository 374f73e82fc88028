//! Bounded previews of the live tables, pushed to the host.

use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;
use prepbox_common::TablePreview;
use prepbox_sql::quote_ident;
use tracing::{debug, warn};

use crate::engine::DataFusionEngine;

pub const DEFAULT_PREVIEW_ROW_LIMIT: usize = 5;

/// Receiver for what the sandbox wants to show next to the editor.
#[cfg_attr(test, mockall::automock)]
pub trait PreviewSink: Send + Sync {
    fn table_previews(&self, previews: &[TablePreview]);

    fn table_list(&self, tables: &[String]);
}

/// Sink that drops everything. Used when the host does not render previews.
#[derive(Debug, Default)]
pub struct NullSink;

impl PreviewSink for NullSink {
    fn table_previews(&self, _previews: &[TablePreview]) {}

    fn table_list(&self, _tables: &[String]) {}
}

/// Emits previews and the table list, skipping emissions identical to the
/// previous one.
pub struct PreviewPublisher {
    sink: Arc<dyn PreviewSink>,
    row_limit: usize,
    last_previews: Mutex<Option<String>>,
    last_tables: Mutex<Option<String>>,
}

impl PreviewPublisher {
    pub fn new(sink: Arc<dyn PreviewSink>, row_limit: usize) -> Self {
        Self {
            sink,
            row_limit,
            last_previews: Mutex::new(None),
            last_tables: Mutex::new(None),
        }
    }

    pub fn row_limit(&self) -> usize {
        self.row_limit
    }

    /// Preview every table in `tables`. Returns whether the previews were
    /// emitted (false when unchanged since the last emission).
    pub async fn publish(&self, engine: &DataFusionEngine, tables: &[String]) -> bool {
        self.publish_table_list(tables);

        let mut previews = Vec::with_capacity(tables.len());
        for table in tables {
            match self.preview_table(engine, table).await {
                Ok(preview) => previews.push(preview),
                Err(e) => warn!(table = %table, error = %e, "skipping table preview"),
            }
        }

        let signature = preview_signature(&previews);
        let mut last = self.last_previews.lock();
        if last.as_deref() == Some(signature.as_str()) {
            debug!("table previews unchanged");
            return false;
        }
        *last = Some(signature);
        drop(last);

        debug!(tables = previews.len(), "publishing table previews");
        self.sink.table_previews(&previews);
        true
    }

    /// Forget what was emitted. If anything was, tell the sink the lists are
    /// now empty.
    pub fn reset(&self) {
        if self.last_tables.lock().take().is_some() {
            self.sink.table_list(&[]);
        }
        if self.last_previews.lock().take().is_some() {
            self.sink.table_previews(&[]);
        }
    }

    fn publish_table_list(&self, tables: &[String]) {
        let signature = tables.iter().sorted().join(",");
        let mut last = self.last_tables.lock();
        if last.as_deref() == Some(signature.as_str()) {
            return;
        }
        *last = Some(signature);
        drop(last);
        self.sink.table_list(tables);
    }

    async fn preview_table(
        &self,
        engine: &DataFusionEngine,
        table: &str,
    ) -> prepbox_common::Result<TablePreview> {
        let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(table), self.row_limit);
        let sample = engine.query(&sql).await?;
        let row_count = engine.count_rows(table).await?;
        Ok(TablePreview {
            table_name: table.to_string(),
            columns: sample.columns,
            rows: sample.rows,
            row_count,
        })
    }
}

fn preview_signature(previews: &[TablePreview]) -> String {
    previews
        .iter()
        .map(|p| format!("{}:{}", p.table_name, p.row_count))
        .sorted()
        .join("|")
}
