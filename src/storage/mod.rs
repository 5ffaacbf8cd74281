// src/storage/mod.rs
pub mod pivot;
pub mod records;

use crate::documents::SourceDocument;
use crate::extractors::{Category, ExtractionResult, ReportDate};
use crate::utils::error::StorageError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub use pivot::PivotTable;
pub use records::{write_records, RecordOrder, TrendRecord};

pub const PIVOT_FILE: &str = "trend_strength_pivot.csv";
pub const PIVOT_CHANGES_FILE: &str = "trend_strength_pivot_with_changes.csv";

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// Per-document output directory: /base_dir/<file stem>/
    pub fn document_dir(&self, document: &SourceDocument) -> Result<PathBuf, StorageError> {
        let target_dir = self.base_dir.join(document.stem());
        if !target_dir.exists() {
            fs::create_dir_all(&target_dir).map_err(StorageError::IoError)?;
        }
        Ok(target_dir)
    }

    /// Saves the raw extracted text with a short provenance header.
    pub fn save_text(&self, document: &SourceDocument) -> Result<PathBuf, StorageError> {
        let file_path = self
            .document_dir(document)?
            .join(format!("{}_text.txt", document.stem()));

        let mut file = fs::File::create(&file_path)?;
        writeln!(file, "Source file: {}", document.file_name)?;
        writeln!(file, "Extracted at: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(file, "{}", "=".repeat(50))?;
        writeln!(file)?;
        file.write_all(document.text.as_bytes())?;

        tracing::info!("Saved extracted text to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves the extraction result and its metadata in JSON format
    pub fn save_result_metadata(
        &self,
        document: &SourceDocument,
        result: &ExtractionResult,
        report_date: &ReportDate,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self
            .document_dir(document)?
            .join(format!("{}_trend.json", document.stem()));

        let counts: serde_json::Map<String, serde_json::Value> = Category::ALL
            .iter()
            .map(|c| (c.label().to_string(), result.count(*c).into()))
            .collect();

        let metadata = serde_json::json!({
            "file_name": document.file_name,
            "source_kind": format!("{:?}", document.kind),
            "report_date": report_date.date,
            "date_source": report_date.source,
            "entry_count": result.len(),
            "category_counts": counts,
            "skipped_segments": result.skipped,
            "entries": result.entries,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }

    /// Writes the by-variety, by-date and by-file record tables.
    pub fn save_record_tables(&self, records: &[TrendRecord]) -> Result<Vec<PathBuf>, StorageError> {
        RecordOrder::ALL
            .iter()
            .map(|order| {
                let path = self.base_dir.join(order.file_name());
                write_records(&path, records, *order)?;
                tracing::info!("Saved {} records to {}", records.len(), path.display());
                Ok(path)
            })
            .collect()
    }

    /// Writes the pivot table and its change-marked copy. In incremental mode
    /// an existing pivot is merged first; an unreadable one is overwritten.
    pub fn save_pivot(
        &self,
        records: &[TrendRecord],
        incremental: bool,
    ) -> Result<Option<(PathBuf, PathBuf)>, StorageError> {
        let fresh = PivotTable::from_records(records);
        if fresh.is_empty() {
            tracing::warn!("No dated records; pivot table not written");
            return Ok(None);
        }

        let pivot_path = self.base_dir.join(PIVOT_FILE);
        let changes_path = self.base_dir.join(PIVOT_CHANGES_FILE);

        let table = if incremental && pivot_path.exists() {
            match PivotTable::load(&pivot_path) {
                Ok(existing) => {
                    tracing::info!(
                        "Incremental update: existing {} dates × {} varieties, new {} dates × {} varieties",
                        existing.dates().count(),
                        existing.columns().count(),
                        fresh.dates().count(),
                        fresh.columns().count()
                    );
                    existing.merge(fresh)
                }
                Err(e) => {
                    tracing::warn!("Could not read existing pivot, overwriting with new data: {}", e);
                    fresh
                }
            }
        } else {
            fresh
        };

        table.write(&pivot_path)?;
        table.write_with_changes(&changes_path)?;

        tracing::info!(
            "Saved pivot table ({} dates × {} varieties) to {}",
            table.dates().count(),
            table.columns().count(),
            pivot_path.display()
        );
        tracing::info!("Detected {} trend strength changes (marked ★)", table.change_count());

        Ok(Some((pivot_path, changes_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::models::DocumentKind;
    use crate::extractors::{resolve_report_date, TrendExtractor};

    fn document(file_name: &str, text: &str) -> SourceDocument {
        SourceDocument {
            path: PathBuf::from(file_name),
            file_name: file_name.to_string(),
            kind: DocumentKind::Text,
            text: text.to_string(),
        }
    }

    fn records_for(doc: &SourceDocument) -> (ExtractionResult, ReportDate, Vec<TrendRecord>) {
        let result = TrendExtractor::new().extract(&doc.text, Some(&doc.file_name)).unwrap();
        let date = resolve_report_date(result.date, &doc.text, false);
        let records = TrendRecord::from_result(&result, date.date, &doc.file_name);
        (result, date, records)
    }

    #[test]
    fn test_save_result_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path().join("out")).unwrap();
        let doc = document("report_20240115.txt", "【趋势强度】\n偏强\n玉米(+2.5)\n中性\n小麦(0)\n");
        let (result, date, _) = records_for(&doc);

        let path = storage.save_result_metadata(&doc, &result, &date).unwrap();
        assert!(path.ends_with("report_20240115/report_20240115_trend.json"));

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["report_date"], "2024-01-15");
        assert_eq!(json["date_source"], "file_name");
        assert_eq!(json["entry_count"], 2);
        assert_eq!(json["category_counts"]["偏弱"], 0);
        assert_eq!(json["entries"][0]["item_name"], "玉米");
        assert_eq!(json["entries"][0]["category"], "偏强");
    }

    #[test]
    fn test_save_text_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        let doc = document("a.txt", "正文");
        let path = storage.save_text(&doc).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("Source file: a.txt\n"));
        assert!(content.ends_with("\n正文"));
    }

    #[test]
    fn test_incremental_pivot_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        let day1 = document("r_20240115.txt", "【趋势强度】\n偏强\n玉米(1)\n");
        let (_, _, records) = records_for(&day1);
        storage.save_pivot(&records, true).unwrap().unwrap();

        let day2 = document("r_20240116.txt", "【趋势强度】\n偏强\n玉米(2)\n");
        let (_, _, records) = records_for(&day2);
        let (pivot_path, changes_path) = storage.save_pivot(&records, true).unwrap().unwrap();

        let pivot = PivotTable::load(&pivot_path).unwrap();
        assert_eq!(pivot.dates().collect::<Vec<_>>(), vec!["2024-01-15", "2024-01-16"]);
        let changes = fs::read_to_string(changes_path).unwrap();
        assert!(changes.contains("2024-01-16,★2.0"));

        // Without incremental mode the old day is dropped.
        let (pivot_path, _) = storage.save_pivot(&records, false).unwrap().unwrap();
        assert_eq!(PivotTable::load(&pivot_path).unwrap().dates().count(), 1);
    }

    #[test]
    fn test_second_report_for_same_date_keeps_other_varieties() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        let first = document("a_20240115.txt", "【趋势强度】\n偏强\n玉米(1)\n铜(2)\n");
        let (_, _, records) = records_for(&first);
        storage.save_pivot(&records, true).unwrap().unwrap();

        let second = document("b_20240115.txt", "【趋势强度】\n偏弱\n铜(-1)\n");
        let (_, _, records) = records_for(&second);
        let (pivot_path, _) = storage.save_pivot(&records, true).unwrap().unwrap();

        let pivot = PivotTable::load(&pivot_path).unwrap();
        assert_eq!(pivot.value("2024-01-15", "玉米"), 1.0);
        assert_eq!(pivot.value("2024-01-15", "铜"), -1.0);
    }

    #[test]
    fn test_pivot_skipped_without_dates() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        let doc = document("undated.txt", "【趋势强度】\n偏强\n玉米(1)\n");
        let (_, _, records) = records_for(&doc);
        assert!(storage.save_pivot(&records, true).unwrap().is_none());

        let tables = storage.save_record_tables(&records).unwrap();
        assert_eq!(tables.len(), 3);
        assert!(tables.iter().all(|p| p.exists()));
    }
}
