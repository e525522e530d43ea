//! JSON-backed table store used for checkpoints.
//!
//! Writes go to a temporary sibling file first and are renamed into place, so
//! a crash mid-write never leaves a truncated checkpoint behind.

use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::core::{HarvestError, IdentifierList, Table, TableStore};

/// Stores tables and identifier lists as JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTableStore;

impl JsonTableStore {
    /// Create a store.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn write<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), HarvestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, value)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(path: &Path) -> Result<T, HarvestError> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader)
            .map_err(|e| HarvestError::Storage(format!("{}: {e}", path.display())))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl TableStore for JsonTableStore {
    fn save_table(&self, table: &Table, path: &Path) -> Result<(), HarvestError> {
        Self::write(table, path)
    }

    fn load_table(&self, path: &Path) -> Result<Table, HarvestError> {
        Self::read(path)
    }

    fn save_identifiers(&self, ids: &IdentifierList, path: &Path) -> Result<(), HarvestError> {
        Self::write(ids, path)
    }

    fn load_identifiers(&self, path: &Path) -> Result<IdentifierList, HarvestError> {
        Self::read(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResultRecord;

    #[test]
    fn test_table_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doi.json");
        let table = Table::from_records(vec![
            ResultRecord::new().with("resid", "r1").with("doi", "10.4211/hs.r1"),
            ResultRecord::new().with("resid", "r3").with("doi", "10.4211/hs.r3"),
        ]);

        let store = JsonTableStore::new();
        store.save_table(&table, &path).unwrap();
        assert!(store.exists(&path));
        assert!(!temp_path(&path).exists());
        assert_eq!(store.load_table(&path).unwrap(), table);
    }

    #[test]
    fn test_identifiers_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources_list.json");
        let ids: IdentifierList = ["z", "a", "m"].into_iter().map(String::from).collect();

        let store = JsonTableStore::new();
        store.save_identifiers(&ids, &path).unwrap();
        assert_eq!(store.load_identifiers(&path).unwrap(), ids);
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"["z","a","m"]"#);
    }

    #[test]
    fn test_corrupt_checkpoint_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funding.json");
        fs::write(&path, "{not json").unwrap();

        let result = JsonTableStore::new().load_table(&path);
        assert!(matches!(result, Err(HarvestError::Storage(_))));
    }
}
