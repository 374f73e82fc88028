//! Stable identity for "these datasets, this setup script, this exercise kind".
//!
//! Two inputs that would leave the engine in the same state share a
//! signature; any change to a field the loader reads produces a new one.
//! Row contents are fingerprinted by count plus a truncated sample, so the
//! cost grows with the number of datasets rather than with their size.

use std::fmt;

use itertools::Itertools;
use prepbox_common::{Dataset, ExerciseKind, JsonRow};
use sha2::{Digest, Sha256};

use crate::csv::line_count;
use crate::script::{normalize_for_signature, truncate_chars};

pub const DEFAULT_SAMPLE_LIMIT: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadSignature(String);

impl LoadSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        truncate_chars(&self.0, 12)
    }
}

impl fmt::Display for LoadSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SignatureBuilder {
    sample_limit: usize,
}

impl Default for SignatureBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_LIMIT)
    }
}

impl SignatureBuilder {
    pub fn new(sample_limit: usize) -> Self {
        Self { sample_limit }
    }

    pub fn build(
        &self,
        datasets: &[Dataset],
        global_sql: Option<&str>,
        kind: ExerciseKind,
    ) -> LoadSignature {
        let canonical = self.canonical_text(datasets, global_sql, kind);
        let digest = Sha256::digest(canonical.as_bytes());
        LoadSignature(hex::encode(digest))
    }

    /// The pre-hash text. Exposed so callers can log what changed.
    pub fn canonical_text(
        &self,
        datasets: &[Dataset],
        global_sql: Option<&str>,
        kind: ExerciseKind,
    ) -> String {
        let global = normalize_for_signature(global_sql.unwrap_or_default());

        let parts = datasets
            .iter()
            .enumerate()
            .sorted_by(|(_, a), (_, b)| a.label().cmp(b.label()))
            .map(|(idx, dataset)| self.dataset_part(dataset, idx + 1))
            .join("|");

        format!("{}::{}::{}", kind.as_str(), global, parts)
    }

    fn dataset_part(&self, dataset: &Dataset, position: usize) -> String {
        let creation = normalize_for_signature(dataset.creation_script().unwrap_or_default());
        let rows = signature_rows(dataset);
        let sample = rows
            .first()
            .map(|row| serde_json::to_string(row).unwrap_or_default())
            .unwrap_or_default();
        let columns = dataset.declared_columns().unwrap_or_default().join(",");
        let csv = dataset.csv_text().unwrap_or_default();

        format!(
            "{}:{}:{}:{}:{}:{}:{}:{}",
            dataset.identifier(),
            creation,
            rows.len(),
            truncate_chars(&sample, self.sample_limit),
            columns,
            dataset.target_table(position),
            line_count(csv),
            truncate_chars(csv, self.sample_limit),
        )
    }
}

fn signature_rows(dataset: &Dataset) -> Vec<JsonRow> {
    let explicit = dataset.explicit_rows().unwrap_or_default();
    if !explicit.is_empty() {
        return explicit;
    }
    dataset.schema_rows().unwrap_or_default()
}

pub fn build_signature(
    datasets: &[Dataset],
    global_sql: Option<&str>,
    kind: ExerciseKind,
    sample_limit: usize,
) -> LoadSignature {
    SignatureBuilder::new(sample_limit).build(datasets, global_sql, kind)
}
