// src/extractors/mod.rs
pub mod date;
pub mod trend;

// Re-export key extraction types for convenience
pub use date::{derive_date, derive_date_from_text, resolve_report_date, DateSource, ReportDate};
pub use trend::{Category, Entry, ExtractionResult, ExtractorConfig, SectionScan, TrendExtractor};
