//! Result records and the row-oriented table they are aggregated into.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::HarvestError;

/// One harvested record: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRecord(BTreeMap<String, Value>);

impl ResultRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Look up a field rendered as text. Null and missing fields are `None`.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<String> {
        self.get(field).and_then(value_text)
    }

    /// Field names in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for ResultRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ResultRecord {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Text form of a cell. Strings are unquoted; null is absent.
#[must_use]
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `count`/`unique`/`top`/`freq` of one column, ignoring missing cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSummary {
    /// Non-missing cells.
    pub count: usize,
    /// Distinct non-missing values.
    pub unique: usize,
    /// Most frequent value (ties go to the value seen first).
    pub top: Option<String>,
    /// Occurrences of `top`.
    pub freq: usize,
}

/// Rows sharing a column set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<ResultRecord>,
}

impl Table {
    /// Build a table whose columns are the union of every record's fields, in
    /// first-seen order.
    #[must_use]
    pub fn from_records(rows: Vec<ResultRecord>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for field in row.fields() {
                if !columns.iter().any(|c| c == field) {
                    columns.push(field.to_string());
                }
            }
        }
        Self { columns, rows }
    }

    /// Build a table with a fixed column order.
    #[must_use]
    pub fn with_columns(columns: Vec<String>, rows: Vec<ResultRecord>) -> Self {
        Self { columns, rows }
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows.
    #[must_use]
    pub fn rows(&self) -> &[ResultRecord] {
        &self.rows
    }

    /// Consume the table.
    #[must_use]
    pub fn into_rows(self) -> Vec<ResultRecord> {
        self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Summarize one column.
    #[must_use]
    pub fn describe(&self, column: &str) -> ColumnSummary {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut count = 0;

        for value in self.rows.iter().filter_map(|r| r.text(column)) {
            count += 1;
            let seen = counts.entry(value.clone()).or_insert(0);
            if *seen == 0 {
                order.push(value);
            }
            *seen += 1;
        }

        let mut top = None;
        let mut freq = 0;
        for value in order {
            let n = counts[&value];
            if n > freq {
                freq = n;
                top = Some(value);
            }
        }

        ColumnSummary { count, unique: counts.len(), top, freq }
    }

    /// Full outer join on `key`.
    ///
    /// Every matching pair of rows yields one merged row. Unmatched rows from
    /// either side are kept as they are. A non-key column present on both
    /// sides is renamed `<column>_x` (left) and `<column>_y` (right). Rows with
    /// a missing or null key never match.
    #[must_use]
    pub fn outer_join(&self, right: &Self, key: &str) -> Self {
        let overlapping: Vec<&String> = self
            .columns
            .iter()
            .filter(|c| c.as_str() != key && right.columns.contains(c))
            .collect();
        let rename = |column: &str, suffix: &str| -> String {
            if overlapping.iter().any(|c| c.as_str() == column) {
                format!("{column}{suffix}")
            } else {
                column.to_string()
            }
        };
        let suffixed = |row: &ResultRecord, suffix: &str| -> ResultRecord {
            row.clone()
                .into_iter()
                .map(|(field, value)| (rename(&field, suffix), value))
                .collect()
        };

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            if let Some(k) = row.text(key) {
                index.entry(k).or_default().push(i);
            }
        }

        let mut matched = vec![false; right.rows.len()];
        let mut rows = Vec::with_capacity(self.rows.len());
        for left_row in &self.rows {
            let hits = left_row.text(key).and_then(|k| index.get(&k));
            match hits {
                Some(hits) => {
                    for &i in hits {
                        matched[i] = true;
                        let mut merged = suffixed(left_row, "_x");
                        for (field, value) in suffixed(&right.rows[i], "_y") {
                            if field != key {
                                merged.insert(field, value);
                            }
                        }
                        rows.push(merged);
                    }
                }
                None => rows.push(suffixed(left_row, "_x")),
            }
        }
        for (i, right_row) in right.rows.iter().enumerate() {
            if !matched[i] {
                rows.push(suffixed(right_row, "_y"));
            }
        }

        let mut columns: Vec<String> = self.columns.iter().map(|c| rename(c, "_x")).collect();
        for c in &right.columns {
            let renamed = rename(c, "_y");
            if !columns.contains(&renamed) {
                columns.push(renamed);
            }
        }
        Self { columns, rows }
    }
}

/// Turn drained records into a table.
///
/// `attempted` is the number of items the harvest tried. Zero records from a
/// non-zero attempt is a valid, empty result.
///
/// # Errors
///
/// `HarvestError::EmptyResult` when there are no records and nothing was
/// attempted.
pub fn aggregate(records: Vec<ResultRecord>, attempted: usize) -> Result<Table, HarvestError> {
    if records.is_empty() && attempted == 0 {
        return Err(HarvestError::EmptyResult);
    }
    Ok(Table::from_records(records))
}
