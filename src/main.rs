// src/main.rs
mod documents;
mod extractors;
mod storage;
mod utils;

use clap::Parser;
use documents::SourceDocument;
use extractors::{resolve_report_date, Category, ExtractorConfig, TrendExtractor};
use std::path::PathBuf;
use storage::{StorageManager, TrendRecord};
use utils::AppError;

/// Command Line Interface for the trend strength extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PDF or text files, or directories containing them
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Output directory for extracted tables and metadata
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// Drop entries whose absolute value exceeds this bound (e.g. 10)
    #[arg(long, env = "TREND_MAX_ABS_VALUE")]
    max_abs_value: Option<f64>,

    /// Keep only the first entry per item within a category
    #[arg(long)]
    dedup: bool,

    /// Overwrite the pivot table instead of merging into an existing one
    #[arg(long)]
    no_incremental: bool,

    /// Use today's date when neither the file name nor the text has one
    #[arg(long)]
    today_fallback: bool,

    /// Also save the raw extracted text of each document
    #[arg(long)]
    save_text: bool,

    /// Debug mode - save annotated text files for debugging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging(args.debug);
    tracing::info!("Starting processing for args: {:?}", args);

    if let Some(bound) = args.max_abs_value {
        if !(bound.is_finite() && bound >= 0.0) {
            return Err(AppError::Config(format!("--max-abs-value must be a non-negative number, got {}", bound)));
        }
    }

    // 3. Initialize storage and extractor
    let storage = StorageManager::new(&args.output_dir)?;
    let extractor = TrendExtractor::with_config(ExtractorConfig {
        max_abs_value: args.max_abs_value,
        dedup: args.dedup,
    });

    // 4. Find the documents to process
    let paths = documents::collect_inputs(&args.inputs)?;
    tracing::info!("Processing {} documents", paths.len());

    // 5. Process each document
    let mut all_records: Vec<TrendRecord> = Vec::new();
    let mut success_count = 0;
    let mut failure_count = 0;

    for path in &paths {
        let document = match documents::load_document(path) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("Failed to load {}: {}", path.display(), e);
                failure_count += 1;
                continue;
            }
        };

        match process_document(&document, &extractor, &storage, &args) {
            Ok(records) => {
                success_count += 1;
                all_records.extend(records);
            }
            Err(e) => {
                tracing::error!("✗ {}: {}", document.file_name, e);
                failure_count += 1;
            }
        }
    }

    // 6. Write the combined tables
    if all_records.is_empty() {
        tracing::warn!("No trend strength entries extracted; no tables written");
    } else {
        storage.save_record_tables(&all_records)?;
        if let Some((pivot, changes)) = storage.save_pivot(&all_records, !args.no_incremental)? {
            tracing::info!("Pivot table: {}", pivot.display());
            tracing::info!("Pivot table with changes: {}", changes.display());
        }
    }

    tracing::info!(
        "Processing finished. Success: {}, Failures: {}, Records: {}",
        success_count,
        failure_count,
        all_records.len()
    );

    if success_count == 0 && failure_count > 0 {
        return Err(AppError::Processing(format!(
            "Failed to extract trend strength from any of {} documents",
            failure_count
        )));
    }

    Ok(())
}

/// Runs extraction for one loaded document and saves its per-document outputs.
fn process_document(
    document: &SourceDocument,
    extractor: &TrendExtractor,
    storage: &StorageManager,
    args: &Args,
) -> Result<Vec<TrendRecord>, AppError> {
    if args.save_text {
        storage.save_text(document)?;
    }

    let result = match extractor.extract(&document.text, Some(&document.file_name)) {
        Ok(result) => result,
        Err(e) => {
            report_missing_section(document);
            if args.debug {
                let failure_path = storage.document_dir(document)?.join("extraction_failure.txt");
                std::fs::write(&failure_path, format!("{}: {}\n", document.file_name, e))?;
            }
            return Err(e.into());
        }
    };

    let report_date = resolve_report_date(result.date, &document.text, args.today_fallback);

    tracing::info!(
        "✓ {}: {} entries ({} {}, {} {}, {} {}), {} skipped, date {}",
        document.file_name,
        result.len(),
        Category::Strong,
        result.count(Category::Strong),
        Category::Neutral,
        result.count(Category::Neutral),
        Category::Weak,
        result.count(Category::Weak),
        result.skipped,
        report_date
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    if result.is_empty() {
        tracing::warn!("{}: section found but no entries matched", document.file_name);
    }
    for entry in &result.entries {
        tracing::debug!("  [{}] {}: {}", entry.category, entry.item_name, entry.value);
    }

    storage.save_result_metadata(document, &result, &report_date)?;

    if args.debug {
        let scan = extractor.scan(&document.text)?;
        let debug_path = storage
            .document_dir(document)?
            .join(format!("{}_annotated.txt", document.stem()));
        if let Err(e) = utils::text_debug::save_debug_text(&document.text, &debug_path, &scan) {
            tracing::warn!("Failed to create annotated text: {}", e);
        }
    }

    Ok(TrendRecord::from_result(&result, report_date.date, &document.file_name))
}

/// Logs lines that mention the section name so a missing or mangled marker
/// can be diagnosed from the log alone.
fn report_missing_section(document: &SourceDocument) {
    let hits: Vec<&str> = document
        .text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains("趋势强度"))
        .take(5)
        .collect();

    if hits.is_empty() {
        tracing::warn!("{}: no line mentions 趋势强度", document.file_name);
    } else {
        tracing::warn!("{}: section marker not found; lines mentioning 趋势强度:", document.file_name);
        for line in hits {
            tracing::warn!("  {}", line);
        }
    }
}
