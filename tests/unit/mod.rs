//! Unit tests for individual components

mod config_test;
mod error_test;
mod storage_test;
mod work_source_test;
