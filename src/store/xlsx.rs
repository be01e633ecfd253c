use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use super::{select_kinase_column, StoreError, TabularStore};
use crate::models::{KinaseName, KinaseResult, RunMetadata};

pub const ABSTRACTS_SHEET: &str = "Abstracts";
pub const METADATA_SHEET: &str = "Metadata";

/// Longest text Excel accepts in a single cell.
const MAX_CELL_CHARS: usize = 32_767;

/// Spreadsheet store: reads any workbook calamine understands, writes `.xlsx`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxStore;

impl TabularStore for XlsxStore {
    fn read_kinases(&self, path: &Path, column: Option<&str>) -> Result<Vec<KinaseName>, StoreError> {
        tracing::info!("Attempting to load kinases from: {}", path.display());
        let mut workbook = open_workbook_auto(path).map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| StoreError::NoWorksheet { path: path.to_path_buf() })?
            .map_err(|e| StoreError::Open {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default();
        tracing::info!("Available columns: {:?}", headers);

        let idx = select_kinase_column(&headers, column).ok_or_else(|| {
            StoreError::MissingKinaseColumn {
                path: path.to_path_buf(),
                columns: headers.clone(),
            }
        })?;

        let kinases: Vec<KinaseName> = rows
            .filter_map(|row| row.get(idx))
            .filter_map(|cell| KinaseName::new(&cell_text(cell)))
            .collect();
        tracing::info!("Successfully loaded {} kinases from column {:?}", kinases.len(), headers[idx]);
        Ok(kinases)
    }

    fn write_results(
        &self,
        path: &Path,
        results: &[KinaseResult],
        metadata: &RunMetadata,
    ) -> Result<(), StoreError> {
        build_workbook(results, metadata)
            .and_then(|mut workbook| workbook.save(path))
            .map_err(|e| StoreError::Write {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

fn build_workbook(results: &[KinaseResult], metadata: &RunMetadata) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(ABSTRACTS_SHEET)?;
        for (col, name) in ["Kinase", "Title", "Abstract"].iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *name, &header)?;
        }
        for (i, result) in results.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_string(row, 0, result.kinase.as_str())?;
            sheet.write_string(row, 1, fit_cell(&result.title, result.kinase.as_str()))?;
            sheet.write_string(row, 2, fit_cell(&result.abstract_text, result.kinase.as_str()))?;
        }
        sheet.set_column_width(0, 16)?;
        sheet.set_column_width(1, 60)?;
        sheet.set_column_width(2, 120)?;
    }

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(METADATA_SHEET)?;
        sheet.write_string_with_format(0, 0, "Metadata", &header)?;
        sheet.write_string_with_format(0, 1, "Value", &header)?;
        sheet.write_string(1, 0, "Extraction Date (UTC)")?;
        sheet.write_string(1, 1, &metadata.extraction_timestamp)?;
        sheet.write_string(2, 0, "User")?;
        sheet.write_string(2, 1, &metadata.user)?;
        sheet.write_string(3, 0, "Total Kinases Processed")?;
        sheet.write_number(3, 1, metadata.total_kinases_processed as f64)?;
        sheet.set_column_width(0, 24)?;
        sheet.set_column_width(1, 24)?;
    }

    Ok(workbook)
}

/// Truncate at a character boundary so the cell stays within Excel's limit.
fn fit_cell<'t>(text: &'t str, kinase: &str) -> &'t str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            tracing::warn!(
                "Text for {} exceeds {} characters and was truncated in the workbook",
                kinase,
                MAX_CELL_CHARS
            );
            &text[..cut]
        }
        None => text,
    }
}
