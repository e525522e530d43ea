//! CSV table store used for exports.
//!
//! CSV carries no types, so every loaded cell is a string and empty cells are
//! treated as missing.

use std::fs::create_dir_all;
use std::path::Path;

use serde_json::Value;

use crate::core::aggregator::value_text;
use crate::core::{HarvestError, IdentifierList, ResultRecord, Table, TableStore};

const ID_COLUMN: &str = "resource_id";

/// Stores tables as CSV with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableStore;

impl CsvTableStore {
    /// Create a store.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn ensure_parent(path: &Path) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    Ok(())
}

impl TableStore for CsvTableStore {
    fn save_table(&self, table: &Table, path: &Path) -> Result<(), HarvestError> {
        ensure_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(
                table
                    .columns()
                    .iter()
                    .map(|c| row.get(c).and_then(value_text).unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    fn load_table(&self, path: &Path) -> Result<Table, HarvestError> {
        let mut reader = csv::Reader::from_path(path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: ResultRecord = columns
                .iter()
                .zip(record.iter())
                .filter(|(_, cell)| !cell.is_empty())
                .map(|(column, cell)| (column.clone(), Value::String(cell.to_string())))
                .collect();
            rows.push(row);
        }
        Ok(Table::with_columns(columns, rows))
    }

    fn save_identifiers(&self, ids: &IdentifierList, path: &Path) -> Result<(), HarvestError> {
        ensure_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([ID_COLUMN])?;
        for id in ids.iter() {
            writer.write_record([id])?;
        }
        writer.flush()?;
        Ok(())
    }

    fn load_identifiers(&self, path: &Path) -> Result<IdentifierList, HarvestError> {
        let table = self.load_table(path)?;
        if !table.columns().iter().any(|c| c == ID_COLUMN) {
            return Err(HarvestError::Storage(format!(
                "{}: missing `{ID_COLUMN}` column",
                path.display()
            )));
        }
        Ok(table.rows().iter().filter_map(|r| r.text(ID_COLUMN)).collect())
    }
}
