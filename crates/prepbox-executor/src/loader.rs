//! Materializes datasets into the SQL engine, once per dataset definition.
//!
//! A load pass is keyed by a [`LoadSignature`]. Statements that succeed are
//! recorded in the signature's [`LoadState`], so a pass that fails halfway can
//! be retried without replaying what already ran. A changed signature starts
//! from a fresh state; tables created under the old one are left in place.
//!
//! Only one pass runs at a time. A request arriving while a pass is running
//! is parked (the latest one wins) and run when the pass ends. If its
//! signature differs, the running pass stops before its next statement.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use prepbox_common::error::{Error, Result};
use prepbox_common::{Dataset, ExerciseKind, JsonRow};
use prepbox_sql::csv::CsvTable;
use prepbox_sql::{
    LoadSignature, SignatureBuilder, build_insert_statements, collapse_whitespace, contains_insert,
    created_table_refs, extract_table_names, is_create_table, looks_like_sql, parse_csv,
    resolve_column_order, sanitize_script, split_statements, strip_code_fences,
};
use tracing::{debug, info, instrument, warn};

use crate::engine::DataFusionEngine;
use crate::metrics::MetricsSnapshot;
use crate::preview::PreviewPublisher;

/// What one signature has already done to the engine.
#[derive(Debug, Clone, Default)]
pub struct LoadState {
    executed: HashSet<String>,
    created_tables: HashSet<String>,
    global_script: Option<String>,
    completed: bool,
    preview_published: bool,
}

impl LoadState {
    pub fn has_executed(&self, statement: &str) -> bool {
        self.executed.contains(&statement.to_lowercase())
    }

    pub fn has_created(&self, table: &str) -> bool {
        self.created_tables.contains(&table.to_lowercase())
    }

    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    pub fn created_tables(&self) -> impl Iterator<Item = &str> {
        self.created_tables.iter().map(String::as_str)
    }

    pub fn global_script(&self) -> Option<&str> {
        self.global_script.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_preview_published(&self) -> bool {
        self.preview_published
    }

    fn record_statement(&mut self, statement: &str) {
        self.executed.insert(statement.to_lowercase());
        self.created_tables.extend(extract_table_names(statement));
    }

    fn record_table(&mut self, table: &str) {
        self.created_tables.insert(table.to_lowercase());
    }
}

/// Load states keyed by signature. Exactly one entry is active; activating
/// another signature evicts everything else.
#[derive(Debug, Default)]
pub struct LoadStateCache {
    entries: HashMap<LoadSignature, LoadState>,
    active: Option<LoadSignature>,
}

impl LoadStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `signature` the active entry. Returns true when it was not
    /// already active, in which case the entry is fresh.
    pub fn activate(&mut self, signature: &LoadSignature) -> bool {
        if self.active.as_ref() == Some(signature) && self.entries.contains_key(signature) {
            return false;
        }
        self.entries.clear();
        self.entries.insert(signature.clone(), LoadState::default());
        self.active = Some(signature.clone());
        true
    }

    pub fn active_signature(&self) -> Option<&LoadSignature> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&LoadState> {
        self.active.as_ref().and_then(|sig| self.entries.get(sig))
    }

    pub fn active_mut(&mut self) -> Option<&mut LoadState> {
        let sig = self.active.as_ref()?;
        self.entries.get_mut(sig)
    }

    pub fn get(&self, signature: &LoadSignature) -> Option<&LoadState> {
        self.entries.get(signature)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.active = None;
    }
}

/// One request to bring the engine in line with a dataset definition.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub datasets: Vec<Dataset>,
    pub global_sql: Option<String>,
    pub kind: ExerciseKind,
    signature: LoadSignature,
}

impl LoadRequest {
    pub fn new(
        datasets: Vec<Dataset>,
        global_sql: Option<String>,
        kind: ExerciseKind,
        builder: &SignatureBuilder,
    ) -> Self {
        let signature = builder.build(&datasets, global_sql.as_deref(), kind);
        Self {
            datasets,
            global_sql,
            kind,
            signature,
        }
    }

    pub fn signature(&self) -> &LoadSignature {
        &self.signature
    }
}

/// Counters for a completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub executed: usize,
    pub skipped: usize,
    pub bulk_loaded: usize,
    pub tables: Vec<String>,
    /// Engine work done by this pass, previews included.
    pub engine: MetricsSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The pass ran to the end.
    Completed(LoadReport),
    /// The signature had already completed; the engine was not touched.
    UpToDate,
    /// Nothing needed loading for this exercise.
    NotRequired,
    /// Another pass was running; this request runs when it ends.
    Deferred,
    /// A request with a different signature arrived and the pass stopped.
    Superseded,
    /// The loader was cancelled mid-pass.
    Cancelled,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(
            self,
            LoadOutcome::Completed(_) | LoadOutcome::UpToDate | LoadOutcome::NotRequired
        )
    }

    pub fn report(&self) -> Option<&LoadReport> {
        match self {
            LoadOutcome::Completed(report) => Some(report),
            LoadOutcome::UpToDate
            | LoadOutcome::NotRequired
            | LoadOutcome::Deferred
            | LoadOutcome::Superseded
            | LoadOutcome::Cancelled => None,
        }
    }
}

/// Why a pass stopped early.
enum Halt {
    Superseded,
    Cancelled,
    Failed(Error),
}

impl From<Error> for Halt {
    fn from(e: Error) -> Self {
        Halt::Failed(e)
    }
}

struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DatasetLoader {
    cache: tokio::sync::Mutex<LoadStateCache>,
    in_progress: AtomicBool,
    pending: Mutex<Option<LoadRequest>>,
    cancelled: AtomicBool,
    publisher: PreviewPublisher,
}

impl DatasetLoader {
    pub fn new(publisher: PreviewPublisher) -> Self {
        Self {
            cache: tokio::sync::Mutex::new(LoadStateCache::new()),
            in_progress: AtomicBool::new(false),
            pending: Mutex::new(None),
            cancelled: AtomicBool::new(false),
            publisher,
        }
    }

    pub fn publisher(&self) -> &PreviewPublisher {
        &self.publisher
    }

    pub fn is_loading(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Signature of the active load state, if any.
    pub async fn active_signature(&self) -> Option<LoadSignature> {
        self.cache.lock().await.active_signature().cloned()
    }

    /// Snapshot of the active load state.
    pub async fn active_state(&self) -> Option<LoadState> {
        self.cache.lock().await.active().cloned()
    }

    /// Ask a running pass to stop before its next statement.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.pending.lock().take();
    }

    /// Drop every load state and clear the preview. Used when the engine the
    /// states describe goes away.
    pub async fn forget(&self) {
        self.cache.lock().await.clear();
        self.publisher.reset();
    }

    /// Bring the engine in line with `request`.
    ///
    /// Returns `Deferred` straight away when another pass is running; the
    /// request is parked and picked up by that pass before it returns.
    #[instrument(skip_all, fields(signature = request.signature().short()))]
    pub async fn load(&self, engine: &DataFusionEngine, request: LoadRequest) -> Result<LoadOutcome> {
        if self.in_progress.swap(true, Ordering::AcqRel) {
            debug!("load pass running, request deferred");
            *self.pending.lock() = Some(request);
            return Ok(LoadOutcome::Deferred);
        }
        let _guard = InProgressGuard(&self.in_progress);
        self.cancelled.store(false, Ordering::Release);

        let mut request = request;
        let mut settled: Option<LoadOutcome> = None;
        loop {
            let result = self.run_pass(engine, &request).await;

            if self.cancelled.load(Ordering::Acquire) {
                self.pending.lock().take();
                info!("load cancelled");
                return Ok(LoadOutcome::Cancelled);
            }

            let Some(next) = self.pending.lock().take() else {
                return match result {
                    Ok(LoadOutcome::UpToDate) => Ok(settled.unwrap_or(LoadOutcome::UpToDate)),
                    Ok(outcome) => Ok(outcome),
                    Err(Halt::Superseded) => Ok(LoadOutcome::Superseded),
                    Err(Halt::Cancelled) => Ok(LoadOutcome::Cancelled),
                    Err(Halt::Failed(e)) => Err(e),
                };
            };

            match result {
                Ok(LoadOutcome::UpToDate) => {}
                Ok(outcome) => settled = Some(outcome),
                Err(Halt::Superseded) => {
                    debug!(next = next.signature().short(), "load pass superseded");
                    settled = None;
                }
                Err(Halt::Cancelled) => return Ok(LoadOutcome::Cancelled),
                Err(Halt::Failed(e)) => {
                    warn!(error = %e, "load pass failed, running pending request");
                    settled = None;
                }
            }
            request = next;
        }
    }

    async fn run_pass(
        &self,
        engine: &DataFusionEngine,
        request: &LoadRequest,
    ) -> std::result::Result<LoadOutcome, Halt> {
        let signature = request.signature();
        let mut cache = self.cache.lock().await;
        if cache.activate(signature) {
            info!(signature = signature.short(), "dataset definition changed, load state reset");
            self.publisher.reset();
        }
        let state = cache
            .active_mut()
            .ok_or_else(|| Error::internal("no active load state"))?;
        if state.completed {
            debug!("datasets already loaded");
            return Ok(LoadOutcome::UpToDate);
        }

        let before = engine.metrics().snapshot();
        let mut pass = Pass {
            loader: self,
            engine,
            signature,
            state,
            report: LoadReport::default(),
        };
        match pass.run(request).await {
            Ok(()) => {}
            Err(Halt::Failed(e)) => {
                warn!(error = %e, "load pass failed");
                self.publisher.reset();
                return Err(Halt::Failed(e));
            }
            Err(halt) => return Err(halt),
        }

        let tables = match engine.list_tables().await {
            Ok(tables) => tables,
            Err(e) => {
                warn!(error = %e, "could not list tables");
                Vec::new()
            }
        };
        self.publisher.publish(engine, &tables).await;

        let mut report = pass.report;
        pass.state.completed = true;
        pass.state.preview_published = true;
        report.tables = tables;
        report.engine = engine.metrics().snapshot().since(&before);
        info!(
            executed = report.executed,
            skipped = report.skipped,
            bulk_loaded = report.bulk_loaded,
            tables = report.tables.len(),
            engine_ms = report.engine.busy.as_millis() as u64,
            "datasets loaded"
        );
        Ok(LoadOutcome::Completed(report))
    }

    fn check_interrupted(&self, signature: &LoadSignature) -> std::result::Result<(), Halt> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(Halt::Cancelled);
        }
        let superseded = self
            .pending
            .lock()
            .as_ref()
            .is_some_and(|next| next.signature() != signature);
        if superseded {
            return Err(Halt::Superseded);
        }
        Ok(())
    }
}

/// A single load pass over one request.
struct Pass<'a> {
    loader: &'a DatasetLoader,
    engine: &'a DataFusionEngine,
    signature: &'a LoadSignature,
    state: &'a mut LoadState,
    report: LoadReport,
}

impl Pass<'_> {
    async fn run(&mut self, request: &LoadRequest) -> std::result::Result<(), Halt> {
        self.run_global_script(request.global_sql.as_deref()).await?;
        for (idx, dataset) in request.datasets.iter().enumerate() {
            self.load_dataset(dataset, idx + 1).await?;
        }
        Ok(())
    }

    async fn run_global_script(&mut self, global_sql: Option<&str>) -> std::result::Result<(), Halt> {
        let script = strip_code_fences(global_sql.unwrap_or_default());
        if script.is_empty() || self.state.global_script.as_deref() == Some(script.as_str()) {
            return Ok(());
        }
        debug!("running global creation script");
        self.run_script(&script).await?;
        self.state.global_script = Some(script);
        Ok(())
    }

    async fn load_dataset(&mut self, dataset: &Dataset, position: usize) -> std::result::Result<(), Halt> {
        let table = dataset.target_table(position);
        let csv = dataset.csv_text().map(parse_csv);
        let rows = dataset_rows(dataset, csv.as_ref());

        let Some(script) = dataset.creation_script().map(strip_code_fences) else {
            return self.bulk_load(dataset, &table, &rows, csv.as_ref());
        };
        if script.is_empty() {
            return self.bulk_load(dataset, &table, &rows, csv.as_ref());
        }
        if !looks_like_sql(&script) {
            info!(dataset = dataset.label(), "creation script is not SQL, skipped");
            return Ok(());
        }

        let creates = extract_table_names(&script);
        if !creates.is_empty() && creates.iter().all(|name| self.state.has_created(name)) {
            debug!(dataset = dataset.label(), "tables already created, creation script skipped");
            return Ok(());
        }

        debug!(dataset = dataset.label(), "running creation script");
        self.run_script(&script).await?;

        if !contains_insert(&script) && !rows.is_empty() {
            self.insert_rows(dataset, &table, &rows, csv.as_ref()).await?;
        }
        Ok(())
    }

    /// One generated `INSERT` per row, each going through the executed-statement
    /// set like any other statement. Rows that render to the same statement are
    /// inserted once; bulk loading keeps such duplicates.
    async fn insert_rows(
        &mut self,
        dataset: &Dataset,
        table: &str,
        rows: &[JsonRow],
        csv: Option<&CsvTable>,
    ) -> std::result::Result<(), Halt> {
        let columns = resolve_column_order(
            dataset.declared_columns(),
            csv.map(|c| c.columns.as_slice()),
            rows,
        );
        let actual_table = self
            .engine
            .resolve_table_name(table)
            .await?
            .unwrap_or_else(|| table.to_string());
        let actual_columns = self.engine.resolve_column_names(&actual_table, &columns).await?;
        let rows = rekey_rows(rows, &columns, &actual_columns);

        debug!(table = %actual_table, rows = rows.len(), "inserting rows via generated SQL");
        for statement in build_insert_statements(&actual_table, &actual_columns, &rows) {
            self.run_statement(&statement).await?;
        }
        Ok(())
    }

    fn bulk_load(
        &mut self,
        dataset: &Dataset,
        table: &str,
        rows: &[JsonRow],
        csv: Option<&CsvTable>,
    ) -> std::result::Result<(), Halt> {
        if rows.is_empty() {
            debug!(table, "no rows to load");
            return Ok(());
        }
        self.loader.check_interrupted(self.signature)?;

        let columns = resolve_column_order(
            dataset.declared_columns(),
            csv.map(|c| c.columns.as_slice()),
            rows,
        );
        debug!(table, rows = rows.len(), "bulk loading dataset");
        self.engine.load_rows(table, &columns, rows)?;
        self.state.record_table(table);
        self.report.bulk_loaded += 1;
        Ok(())
    }

    /// Sanitize, split and replay a script statement by statement.
    async fn run_script(&mut self, script: &str) -> std::result::Result<(), Halt> {
        for statement in split_statements(&sanitize_script(script)) {
            self.run_statement(&collapse_whitespace(&statement)).await?;
        }
        Ok(())
    }

    async fn run_statement(&mut self, statement: &str) -> std::result::Result<(), Halt> {
        if statement.is_empty() {
            return Ok(());
        }
        if self.state.has_executed(statement) {
            self.report.skipped += 1;
            return Ok(());
        }
        if is_create_table(statement) && self.tables_exist(statement).await? {
            debug!(statement, "tables already exist, statement skipped");
            self.state.record_statement(statement);
            self.report.skipped += 1;
            return Ok(());
        }

        self.loader.check_interrupted(self.signature)?;
        self.engine.execute_sql(statement).await?;
        self.state.record_statement(statement);
        self.report.executed += 1;
        Ok(())
    }

    async fn tables_exist(&self, statement: &str) -> Result<bool> {
        let refs = created_table_refs(statement);
        if refs.is_empty() {
            return Ok(false);
        }
        for table in &refs {
            if !self.engine.table_exists(table).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Rename row keys from the requested column names to the catalog's.
fn rekey_rows(rows: &[JsonRow], requested: &[String], actual: &[String]) -> Vec<JsonRow> {
    rows.iter()
        .map(|row| {
            requested
                .iter()
                .zip(actual)
                .filter_map(|(from, to)| row.get(from).map(|value| (to.clone(), value.clone())))
                .collect()
        })
        .collect()
}

/// Rows by precedence: `data`, then `schema_info.dataset_rows`, then CSV.
/// Malformed sources count as empty.
fn dataset_rows(dataset: &Dataset, csv: Option<&CsvTable>) -> Vec<JsonRow> {
    let explicit = dataset.explicit_rows().unwrap_or_else(|e| {
        warn!(dataset = dataset.label(), error = %e, "ignoring malformed data rows");
        Vec::new()
    });
    if !explicit.is_empty() {
        return explicit;
    }
    let schema = dataset.schema_rows().unwrap_or_else(|e| {
        warn!(dataset = dataset.label(), error = %e, "ignoring malformed schema rows");
        Vec::new()
    });
    if !schema.is_empty() {
        return schema;
    }
    csv.map(|table| table.rows.clone()).unwrap_or_default()
}
