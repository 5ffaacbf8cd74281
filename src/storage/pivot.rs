// src/storage/pivot.rs
use crate::storage::records::{bom_csv_writer, format_value, TrendRecord};
use crate::utils::error::StorageError;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const INDEX_HEADER: &str = "日期";
const CHANGE_MARK: char = '★';

/// Date × variety grid of trend strengths. Missing cells read as 0.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotTable {
    columns: BTreeSet<String>,
    rows: BTreeMap<String, BTreeMap<String, f64>>,
}

impl PivotTable {
    /// Builds the grid from records, averaging repeated (date, variety) cells.
    /// Undated records cannot be placed on the date axis and are left out.
    pub fn from_records(records: &[TrendRecord]) -> Self {
        let mut sums: BTreeMap<(String, String), (f64, u32)> = BTreeMap::new();
        let mut undated = 0;
        for record in records {
            if record.date.is_none() {
                undated += 1;
                continue;
            }
            let cell = sums.entry((record.date_string(), record.variety.clone())).or_insert((0.0, 0));
            cell.0 += record.strength;
            cell.1 += 1;
        }
        if undated > 0 {
            tracing::warn!("{} undated records left out of the pivot table", undated);
        }

        let mut table = PivotTable::default();
        for ((date, variety), (sum, count)) in sums {
            table.insert(date, variety, sum / f64::from(count));
        }
        table
    }

    /// Reads a pivot table previously written by [`PivotTable::write`].
    /// Written cells are already 0.0-filled, so a loaded 0.0 and a missing
    /// cell read the same through [`PivotTable::value`].
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let content = fs::read_to_string(path)?;
        let content = content.trim_start_matches('\u{feff}');

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(content.as_bytes());
        let columns: Vec<String> = reader.headers()?.iter().skip(1).map(str::to_string).collect();

        let mut table = PivotTable::default();
        table.columns.extend(columns.iter().cloned());
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let date = record
                .get(0)
                .filter(|d| !d.is_empty())
                .ok_or_else(|| StorageError::InvalidPivot(format!("row {} has no date", line + 1)))?
                .to_string();
            table.rows.entry(date.clone()).or_default();
            for (column, raw) in columns.iter().zip(record.iter().skip(1)) {
                let raw = raw.trim().trim_start_matches(CHANGE_MARK);
                if raw.is_empty() {
                    continue;
                }
                let value: f64 = raw.parse().map_err(|_| {
                    StorageError::InvalidPivot(format!("row {} column {}: '{}' is not a number", line + 1, column, raw))
                })?;
                table.insert(date.clone(), column.clone(), value);
            }
        }
        Ok(table)
    }

    /// Combines an older table with newer data cell by cell: a (date, variety)
    /// present in `newer` overwrites the old value, every other cell is kept.
    pub fn merge(mut self, newer: PivotTable) -> PivotTable {
        self.columns.extend(newer.columns);
        for (date, cells) in newer.rows {
            self.rows.entry(date).or_default().extend(cells);
        }
        self
    }

    fn insert(&mut self, date: String, variety: String, value: f64) {
        self.columns.insert(variety.clone());
        self.rows.entry(date).or_default().insert(variety, value);
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn value(&self, date: &str, variety: &str) -> f64 {
        self.rows
            .get(date)
            .and_then(|cells| cells.get(variety))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of day-over-day changes between two non-zero values.
    pub fn change_count(&self) -> usize {
        let dates: Vec<&str> = self.dates().collect();
        self.columns()
            .map(|col| {
                dates
                    .windows(2)
                    .filter(|pair| {
                        let (prev, cur) = (self.value(pair[0], col), self.value(pair[1], col));
                        cur != prev && cur != 0.0 && prev != 0.0
                    })
                    .count()
            })
            .sum()
    }

    /// Writes the plain grid.
    pub fn write(&self, path: &Path) -> Result<(), StorageError> {
        self.write_cells(path, false)
    }

    /// Writes the grid with every value that differs from the previous date's
    /// row prefixed by `★`.
    pub fn write_with_changes(&self, path: &Path) -> Result<(), StorageError> {
        self.write_cells(path, true)
    }

    fn write_cells(&self, path: &Path, mark_changes: bool) -> Result<(), StorageError> {
        let columns: Vec<&str> = self.columns().collect();
        let mut writer = bom_csv_writer(path)?;

        let mut header = vec![INDEX_HEADER];
        header.extend(columns.iter().copied());
        writer.write_record(&header)?;

        let mut previous: Option<&str> = None;
        for date in self.dates() {
            let mut row = Vec::with_capacity(columns.len() + 1);
            row.push(date.to_string());
            for col in &columns {
                let value = self.value(date, col);
                let changed = previous.is_some_and(|prev| self.value(prev, col) != value);
                let cell = if mark_changes && changed {
                    format!("{}{}", CHANGE_MARK, format_value(value))
                } else {
                    format_value(value)
                };
                row.push(cell);
            }
            writer.write_record(&row)?;
            previous = Some(date);
        }
        writer.flush()?;
        Ok(())
    }
}
