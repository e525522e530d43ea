//! Infrastructure adapters: the HydroShare and Crossref clients, terminal
//! prompt, and table storage backends.

pub mod crossref;
pub mod hydroshare;
pub mod prompt;
pub mod storage;

pub use crossref::CrossrefClient;
pub use hydroshare::{HydroShareClient, HydroShareConnector};
pub use prompt::TerminalPrompt;
pub use storage::{CsvTableStore, JsonTableStore};
