// src/extractors/date.rs

// --- Imports ---
use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// Years outside this window are treated as stray digit runs (ids, phone numbers).
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

// --- Regex Patterns (Lazy Static) ---
// ASCII digits only: `\d` would also match full-width digits, which are
// multi-byte and break the byte slicing in `compact_date`.
static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]+").expect("Failed to compile DIGIT_RUN_RE")
});

// 2024-01-15, 2024_1_5, 2024.01.15, 2024/01/15, 2024年1月15日
static SEPARATED_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{4})\s*[-_./年]\s*([0-9]{1,2})\s*[-_./月]\s*([0-9]{1,2})(?:[^0-9]|$)")
        .expect("Failed to compile SEPARATED_DATE_RE")
});

/// Derives a report date from a document's file name.
///
/// Compact `YYYYMMDD` runs are preferred; separated year-month-day groups are
/// the fallback. Candidates that are not real calendar dates are ignored, and
/// `None` is returned when nothing validates.
pub fn derive_date(file_name: &str) -> Option<NaiveDate> {
    let date = compact_date(file_name).or_else(|| separated_date(file_name));
    match date {
        Some(d) => tracing::debug!("Derived date {} from file name '{}'", d, file_name),
        None => tracing::debug!("No date pattern in file name '{}'", file_name),
    }
    date
}

/// Derives a report date from document text. Report headers usually spell
/// the date out with separators, so those are tried before compact runs.
pub fn derive_date_from_text(text: &str) -> Option<NaiveDate> {
    separated_date(text).or_else(|| compact_date(text))
}

/// Where a document's report date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    FileName,
    Content,
    Today,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportDate {
    pub date: Option<NaiveDate>,
    pub source: DateSource,
}

/// Picks the report date for a document: the file name date if present,
/// then a date printed in the text, then (optionally) today.
pub fn resolve_report_date(
    file_name_date: Option<NaiveDate>,
    text: &str,
    today_fallback: bool,
) -> ReportDate {
    if let Some(date) = file_name_date {
        return ReportDate { date: Some(date), source: DateSource::FileName };
    }
    if let Some(date) = derive_date_from_text(text) {
        tracing::info!("No date in file name; using {} found in document text", date);
        return ReportDate { date: Some(date), source: DateSource::Content };
    }
    if today_fallback {
        let today = Local::now().date_naive();
        tracing::warn!("No report date found; falling back to today ({})", today);
        return ReportDate { date: Some(today), source: DateSource::Today };
    }
    tracing::warn!("No report date found; records will be undated");
    ReportDate { date: None, source: DateSource::Unknown }
}

fn compact_date(haystack: &str) -> Option<NaiveDate> {
    DIGIT_RUN_RE
        .find_iter(haystack)
        .map(|m| m.as_str())
        .filter(|run| run.len() >= 8)
        .find_map(|run| {
            // Longer runs are usually timestamps (YYYYMMDDhhmmss); keep the date prefix.
            let digits = run.get(..8)?;
            to_date(digits.get(..4)?, digits.get(4..6)?, digits.get(6..8)?)
        })
}

fn separated_date(haystack: &str) -> Option<NaiveDate> {
    SEPARATED_DATE_RE
        .captures_iter(haystack)
        .find_map(|caps| to_date(&caps[1], &caps[2], &caps[3]))
}

fn to_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?);
    if date.is_none() {
        tracing::trace!("Rejected invalid date candidate {}-{}-{}", year, month, day);
    }
    date
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_compact_date_in_file_name() {
        assert_eq!(derive_date("report_20240115.pdf"), Some(ymd(2024, 1, 15)));
        assert_eq!(derive_date("20231229国泰君安期货晨报.pdf"), Some(ymd(2023, 12, 29)));
    }

    #[test]
    fn test_no_date_in_file_name() {
        assert_eq!(derive_date("report.pdf"), None);
        assert_eq!(derive_date("report_v2.pdf"), None);
        assert_eq!(derive_date(""), None);
    }

    #[test]
    fn test_separated_date_in_file_name() {
        assert_eq!(derive_date("morning-2024-03-07.pdf"), Some(ymd(2024, 3, 7)));
        assert_eq!(derive_date("晨报_2024_3_7.pdf"), Some(ymd(2024, 3, 7)));
        assert_eq!(derive_date("晨报2024年3月7日.pdf"), Some(ymd(2024, 3, 7)));
        assert_eq!(derive_date("daily 2024.11.30.txt"), Some(ymd(2024, 11, 30)));
    }

    #[test]
    fn test_invalid_calendar_dates_are_rejected() {
        assert_eq!(derive_date("report_20241399.pdf"), None);
        assert_eq!(derive_date("report_2024-02-30.pdf"), None);
        // A bad compact run does not hide a good separated one.
        assert_eq!(derive_date("id12345678_2024-02-29.pdf"), Some(ymd(2024, 2, 29)));
    }

    #[test]
    fn test_timestamp_run_keeps_date_prefix() {
        assert_eq!(derive_date("export_20240115093000.pdf"), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_short_digit_runs_are_ignored() {
        assert_eq!(derive_date("report_2024011.pdf"), None);
    }

    #[test]
    fn test_full_width_digits_are_not_date_candidates() {
        assert_eq!(derive_date("晨报１２３４５６７８.pdf"), None);
        assert_eq!(derive_date("晨报２０２４年１月１５日_20240116.pdf"), Some(ymd(2024, 1, 16)));
        assert_eq!(derive_date_from_text("编号：１２３，发布于２０２４年"), None);
        assert_eq!(
            derive_date_from_text("第１２３页\n2024-01-15 早盘"),
            Some(ymd(2024, 1, 15))
        );
    }

    #[test]
    fn test_date_from_text_prefers_written_dates() {
        let text = "编号 20200101\n发布日期：2024年1月15日\n";
        assert_eq!(derive_date_from_text(text), Some(ymd(2024, 1, 15)));
        assert_eq!(derive_date_from_text("编号 20200101"), Some(ymd(2020, 1, 1)));
        assert_eq!(derive_date_from_text("没有日期"), None);
    }

    #[test]
    fn test_resolve_report_date_order() {
        let from_name = resolve_report_date(Some(ymd(2024, 1, 15)), "2023年5月1日", false);
        assert_eq!(from_name, ReportDate { date: Some(ymd(2024, 1, 15)), source: DateSource::FileName });

        let from_text = resolve_report_date(None, "2023年5月1日 晨报", false);
        assert_eq!(from_text, ReportDate { date: Some(ymd(2023, 5, 1)), source: DateSource::Content });

        let unknown = resolve_report_date(None, "无日期", false);
        assert_eq!(unknown, ReportDate { date: None, source: DateSource::Unknown });

        let today = resolve_report_date(None, "无日期", true);
        assert_eq!(today.source, DateSource::Today);
        assert!(today.date.is_some());
    }
}
