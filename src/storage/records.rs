// src/storage/records.rs
use crate::extractors::{Category, ExtractionResult};
use crate::utils::error::StorageError;
use chrono::NaiveDate;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One exported row: an entry plus the document it came from.
/// Column headers follow the reports' own vocabulary: 品种 (variety),
/// 趋势强度 (strength), 日期 (date), 序号 (position), 类别 (category), 文件名 (file).
#[derive(Debug, Clone, PartialEq)]
pub struct TrendRecord {
    pub variety: String,
    pub strength: f64,
    pub date: Option<NaiveDate>,
    /// 1-based position within the category.
    pub seq: usize,
    pub category: Category,
    pub file_name: String,
}

impl TrendRecord {
    /// Flattens one extraction result into export rows.
    pub fn from_result(result: &ExtractionResult, date: Option<NaiveDate>, file_name: &str) -> Vec<Self> {
        let mut records = Vec::with_capacity(result.len());
        for category in Category::ALL {
            for (i, entry) in result.entries_in(category).enumerate() {
                records.push(TrendRecord {
                    variety: entry.item_name.clone(),
                    strength: entry.value,
                    date,
                    seq: i + 1,
                    category,
                    file_name: file_name.to_string(),
                });
            }
        }
        records
    }

    pub fn date_string(&self) -> String {
        self.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
    }
}

/// Column layouts of the three record tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrder {
    ByVariety,
    ByDate,
    ByFile,
}

impl RecordOrder {
    pub const ALL: [RecordOrder; 3] = [RecordOrder::ByVariety, RecordOrder::ByDate, RecordOrder::ByFile];

    pub fn file_name(&self) -> &'static str {
        match self {
            RecordOrder::ByVariety => "trend_strength_by_variety.csv",
            RecordOrder::ByDate => "trend_strength_by_date.csv",
            RecordOrder::ByFile => "trend_strength_by_file.csv",
        }
    }

    fn header(&self) -> [&'static str; 6] {
        match self {
            RecordOrder::ByVariety => ["品种", "趋势强度", "日期", "序号", "类别", "文件名"],
            RecordOrder::ByDate => ["日期", "品种", "趋势强度", "序号", "类别", "文件名"],
            RecordOrder::ByFile => ["文件名", "品种", "趋势强度", "日期", "序号", "类别"],
        }
    }

    fn row(&self, r: &TrendRecord) -> [String; 6] {
        let variety = r.variety.clone();
        let strength = format_value(r.strength);
        let date = r.date_string();
        let seq = r.seq.to_string();
        let category = r.category.label().to_string();
        let file = r.file_name.clone();
        match self {
            RecordOrder::ByVariety => [variety, strength, date, seq, category, file],
            RecordOrder::ByDate => [date, variety, strength, seq, category, file],
            RecordOrder::ByFile => [file, variety, strength, date, seq, category],
        }
    }

    /// Stable sort, so ties keep extraction order.
    fn sort(&self, records: &mut [&TrendRecord]) {
        match self {
            RecordOrder::ByVariety => records.sort_by(|a, b| a.variety.cmp(&b.variety)),
            RecordOrder::ByDate => records.sort_by(|a, b| a.date.cmp(&b.date)),
            RecordOrder::ByFile => {
                records.sort_by(|a, b| (&a.file_name, &a.variety).cmp(&(&b.file_name, &b.variety)))
            }
        }
    }
}

/// Writes the records to `path` in the given order, as UTF-8 CSV with a BOM.
pub fn write_records(path: &Path, records: &[TrendRecord], order: RecordOrder) -> Result<(), StorageError> {
    let mut sorted: Vec<&TrendRecord> = records.iter().collect();
    order.sort(&mut sorted);

    let mut writer = bom_csv_writer(path)?;
    writer.write_record(order.header())?;
    for record in sorted {
        writer.write_record(order.row(record))?;
    }
    writer.flush()?;

    tracing::debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Opens a CSV writer that spreadsheet applications will read as UTF-8.
pub(crate) fn bom_csv_writer(path: &Path) -> Result<csv::Writer<File>, StorageError> {
    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;
    Ok(csv::Writer::from_writer(file))
}

/// Renders a value the way the exports print it: `2.0`, `-1.5`, `0.0`.
pub fn format_value(value: f64) -> String {
    format!("{:?}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::TrendExtractor;
    use std::fs;

    fn sample_records() -> Vec<TrendRecord> {
        let text = "【趋势强度】\n偏强\n玉米(+2.5)\n大豆: -1.2\n中性\n小麦(0.0)\n偏弱\n原油(-1)\n";
        let result = TrendExtractor::new().extract(text, Some("morning_20240115.pdf")).unwrap();
        TrendRecord::from_result(&result, result.date, "morning_20240115.pdf")
    }

    #[test]
    fn test_records_number_entries_within_category() {
        let records = sample_records();
        let seqs: Vec<(&str, usize, Category)> =
            records.iter().map(|r| (r.variety.as_str(), r.seq, r.category)).collect();
        assert_eq!(
            seqs,
            vec![
                ("玉米", 1, Category::Strong),
                ("大豆", 2, Category::Strong),
                ("小麦", 1, Category::Neutral),
                ("原油", 1, Category::Weak),
            ]
        );
        assert_eq!(records[0].date_string(), "2024-01-15");
    }

    #[test]
    fn test_write_records_by_date_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RecordOrder::ByDate.file_name());
        write_records(&path, &sample_records(), RecordOrder::ByDate).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let content = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "日期,品种,趋势强度,序号,类别,文件名");
        assert_eq!(lines[1], "2024-01-15,玉米,2.5,1,偏强,morning_20240115.pdf");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_write_records_by_variety_sorts_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RecordOrder::ByVariety.file_name());
        write_records(&path, &sample_records(), RecordOrder::ByVariety).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let varieties: Vec<&str> = content
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        let mut expected = varieties.clone();
        expected.sort();
        assert_eq!(varieties, expected);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(2.0), "2.0");
        assert_eq!(format_value(-1.2), "-1.2");
        assert_eq!(format_value(0.0), "0.0");
    }
}
