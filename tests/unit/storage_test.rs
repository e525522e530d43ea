//! Tests for table storage backends

use resource_harvester::core::{IdentifierList, ResultRecord, Table, TableStore};
use resource_harvester::infra::{CsvTableStore, JsonTableStore};
use tempfile::TempDir;

fn funding_table() -> Table {
    Table::from_records(vec![
        ResultRecord::new()
            .with("agency_name", "NSF")
            .with("award_number", "EAR-1")
            .with("res_title", "Snowpack"),
        ResultRecord::new()
            .with("agency_name", "NOAA")
            .with("res_title", "Rivers, lakes and \"streams\""),
    ])
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    let store = JsonTableStore::new();
    assert!(!store.exists(&path));
    assert!(store.load_table(&path).is_err());
    assert!(CsvTableStore::new().load_table(&path).is_err());
}

#[test]
fn test_json_store_overwrites() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("funding.json");
    let store = JsonTableStore::new();

    store.save_table(&funding_table(), &path).unwrap();
    let smaller = Table::from_records(vec![ResultRecord::new().with("agency_name", "DOE")]);
    store.save_table(&smaller, &path).unwrap();

    assert_eq!(store.load_table(&path).unwrap(), smaller);
}

#[test]
fn test_csv_store_quotes_awkward_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("funding.csv");
    let store = CsvTableStore::new();

    store.save_table(&funding_table(), &path).unwrap();
    let loaded = store.load_table(&path).unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(
        loaded.rows()[1].text("res_title").as_deref(),
        Some("Rivers, lakes and \"streams\"")
    );
    assert_eq!(loaded.rows()[1].get("award_number"), None);
}

#[test]
fn test_identifier_checkpoint_dedups_on_build() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("resources_list.json");
    let ids: IdentifierList = ["b", "a", "b", "c", "a"].into_iter().map(String::from).collect();
    assert_eq!(ids.len(), 3);

    let store = JsonTableStore::new();
    store.save_identifiers(&ids, &path).unwrap();
    let loaded = store.load_identifiers(&path).unwrap();
    assert_eq!(loaded.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
}
