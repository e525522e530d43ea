//! Tests for configuration validation and overrides

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use resource_harvester::config::{HarvestConfig, WorkerPoolConfig};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_pool_config_defaults() {
    let cfg = WorkerPoolConfig::new();
    assert!(cfg.worker_count >= 1);
    assert_eq!(cfg.input_capacity, 1024);
    assert_eq!(cfg.output_capacity, 1024);
    assert_eq!(cfg.deadline, Duration::from_secs(10));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_pool_config_invalid_worker_count() {
    let cfg = WorkerPoolConfig::new().with_worker_count(0);
    assert!(cfg.validate().unwrap_err().contains("worker_count"));
}

#[test]
fn test_pool_config_invalid_capacity() {
    assert!(WorkerPoolConfig::new().with_input_capacity(0).validate().is_err());
    assert!(WorkerPoolConfig::new().with_output_capacity(0).validate().is_err());
}

#[test]
fn test_pool_config_invalid_deadline() {
    let cfg = WorkerPoolConfig::new().with_deadline(Duration::ZERO);
    assert!(cfg.validate().unwrap_err().contains("deadline"));
}

#[test]
fn test_harvest_config_defaults() {
    let cfg = HarvestConfig::default();
    assert_eq!(cfg.host, "www.hydroshare.org");
    assert_eq!(cfg.begin, NaiveDate::from_ymd_opt(2015, 5, 1).unwrap());
    assert_eq!(cfg.partitions, 1000);
    assert_eq!(cfg.auth_attempts, 3);
    assert!(cfg.use_https);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_harvest_config_from_json() {
    let cfg = HarvestConfig::from_json_str(
        r#"{"host": "beta.hydroshare.org", "begin": "2020-01-01", "end": "2021-01-01", "partitions": 12, "worker_count": 3}"#,
    )
    .unwrap();
    assert_eq!(cfg.host, "beta.hydroshare.org");
    assert_eq!(cfg.partitions, 12);
    assert_eq!(cfg.pool_config().worker_count, 3);
    assert_eq!(cfg.end_date(), NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
}

#[test]
fn test_harvest_config_rejects_reversed_range() {
    let err = HarvestConfig::from_json_str(r#"{"begin": "2021-01-01", "end": "2020-01-01"}"#)
        .unwrap_err();
    assert!(err.contains("begin"));
}

#[test]
fn test_harvest_config_rejects_bad_json() {
    let err = HarvestConfig::from_json_str("{partitions: }").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_harvest_config_rejects_zero_partitions() {
    let cfg = HarvestConfig { partitions: 0, ..HarvestConfig::default() };
    assert!(cfg.validate().unwrap_err().contains("partitions"));
}

#[test]
fn test_env_overrides() {
    let mut cfg = HarvestConfig::default();
    cfg.apply_env_from(env(&[
        ("HARVEST_HOST", "localhost:8000"),
        ("HARVEST_USE_HTTPS", "false"),
        ("HARVEST_WORKERS", "6"),
        ("HARVEST_DEADLINE_SECS", "30"),
        ("HARVEST_END", "2016-01-01"),
        ("HARVEST_CITATION_URL", "http://localhost:9000"),
    ]))
    .unwrap();

    assert_eq!(cfg.host, "localhost:8000");
    assert!(!cfg.use_https);
    assert_eq!(cfg.worker_count, Some(6));
    assert_eq!(cfg.pool_config().deadline, Duration::from_secs(30));
    assert_eq!(cfg.end, NaiveDate::from_ymd_opt(2016, 1, 1));
    assert_eq!(cfg.citation_url, "http://localhost:9000");
}

#[test]
fn test_env_override_parse_error_names_variable() {
    let mut cfg = HarvestConfig::default();
    let err = cfg
        .apply_env_from(env(&[("HARVEST_PARTITIONS", "many")]))
        .unwrap_err();
    assert!(err.contains("HARVEST_PARTITIONS"));
}
