//! Persistence boundary for harvested tables and identifier checkpoints.

use std::path::Path;

use super::aggregator::Table;
use super::error::HarvestError;
use super::work_source::IdentifierList;

/// Row-oriented persistence used for checkpoints and exports.
pub trait TableStore: Send + Sync {
    /// Write `table` to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns `HarvestError::Storage` or `HarvestError::Io` on failure.
    fn save_table(&self, table: &Table, path: &Path) -> Result<(), HarvestError>;

    /// Read a table written by `save_table`.
    ///
    /// # Errors
    ///
    /// Returns `HarvestError::Storage` or `HarvestError::Io` on failure.
    fn load_table(&self, path: &Path) -> Result<Table, HarvestError>;

    /// Write an identifier checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `HarvestError::Storage` or `HarvestError::Io` on failure.
    fn save_identifiers(&self, ids: &IdentifierList, path: &Path) -> Result<(), HarvestError>;

    /// Read an identifier checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `HarvestError::Storage` or `HarvestError::Io` on failure.
    fn load_identifiers(&self, path: &Path) -> Result<IdentifierList, HarvestError>;

    /// Whether a checkpoint exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
