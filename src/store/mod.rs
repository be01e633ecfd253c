pub mod xlsx;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{KinaseName, KinaseResult, RunMetadata};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot open {path}: {message}")]
    Open { path: PathBuf, message: String },
    #[error("{path} contains no worksheet")]
    NoWorksheet { path: PathBuf },
    #[error("No column with 'kinase' in its name found in {path} (columns: {columns:?}). Please specify the column name.")]
    MissingKinaseColumn { path: PathBuf, columns: Vec<String> },
    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Reads kinase names from, and writes results to, a tabular file.
pub trait TabularStore {
    /// Kinase names in row order, blank cells skipped.
    ///
    /// `column` is used when the header exists; otherwise the first header
    /// containing "kinase" (any case) is picked.
    fn read_kinases(&self, path: &Path, column: Option<&str>) -> Result<Vec<KinaseName>, StoreError>;

    /// Replace `path` with an `Abstracts` sheet and a `Metadata` sheet.
    fn write_results(
        &self,
        path: &Path,
        results: &[KinaseResult],
        metadata: &RunMetadata,
    ) -> Result<(), StoreError>;
}

/// Pick the kinase column index from a header row.
pub fn select_kinase_column(headers: &[String], requested: Option<&str>) -> Option<usize> {
    if let Some(name) = requested {
        if let Some(idx) = headers.iter().position(|h| h == name) {
            return Some(idx);
        }
        tracing::warn!("Column {:?} not found, looking for a kinase column instead", name);
    }
    headers
        .iter()
        .position(|h| h.to_lowercase().contains("kinase"))
}

/// Sibling checkpoint path: `out/results.xlsx` → `out/results_partial.xlsx`.
pub fn partial_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}_partial", stem),
    };
    path.with_file_name(name)
}
