// src/extractors/trend.rs

// --- Imports ---
use crate::extractors::date::derive_date;
use crate::utils::error::ExtractError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

// --- Regex Patterns (Lazy Static) ---
// The section heading. Full-width brackets are what the reports print; the
// ASCII form shows up when the PDF text layer substitutes glyphs.
static SECTION_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"【\s*趋势强度\s*】|\[\s*趋势强度\s*\]").expect("Failed to compile SECTION_MARKER_RE")
});

// The next top-level heading closes the section.
static SECTION_END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)【|^[ \t]*\[").expect("Failed to compile SECTION_END_RE")
});

// A label opens a subsection when it starts a line or carries a colon, so
// prose such as "整体偏强" inside a note is not mistaken for a heading.
static CATEGORY_LABEL_RE: Lazy<[Regex; 3]> = Lazy::new(|| {
    Category::ALL.map(|category| {
        let label = category.label();
        let pattern = format!(
            r"(?m)^[ \t]*{label}(?:品种)?[ \t]*[:：]?|{label}(?:品种)?[ \t]*[:：]"
        );
        Regex::new(&pattern).expect("Failed to compile CATEGORY_LABEL_RE")
    })
});

// Entries inside one subsection are separated by line breaks or list punctuation.
static SEGMENT_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\r\n、，,；;]").expect("Failed to compile SEGMENT_SEPARATOR_RE")
});

// Shape A: 玉米(+2.5) / 玉米（-1）. Several may share a segment.
static PAREN_ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<name>[^\s()（）:：]+)\s*[（(]\s*(?P<value>[^()（）]*?)\s*[）)]")
        .expect("Failed to compile PAREN_ENTRY_RE")
});

// Shape B: 大豆: -1.2 / 大豆：+1
static COLON_ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[^:：]+?)\s*[:：]\s*(?P<value>\S+)$").expect("Failed to compile COLON_ENTRY_RE")
});

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)$").expect("Failed to compile NUMBER_RE")
});

// --- Data Structures ---

/// Sentiment classification of an item within the trend strength section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    #[serde(rename = "偏强")]
    Strong,
    #[serde(rename = "中性")]
    Neutral,
    #[serde(rename = "偏弱")]
    Weak,
}

impl Category {
    /// Document order of the subsections.
    pub const ALL: [Category; 3] = [Category::Strong, Category::Neutral, Category::Weak];

    /// The label the reports print for this category.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Strong => "偏强",
            Category::Neutral => "中性",
            Category::Weak => "偏弱",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One (item name, value) pair found under a category label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub item_name: String,
    pub value: f64,
    pub category: Category,
}

/// Everything extracted from a single document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionResult {
    /// Category-major, document order within each category.
    pub entries: Vec<Entry>,
    /// Report date derived from the file name, if any.
    pub date: Option<NaiveDate>,
    /// Non-blank segments that were dropped (unmatched, malformed or filtered).
    pub skipped: usize,
}

impl ExtractionResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, category: Category) -> usize {
        self.entries_in(category).count()
    }

    pub fn entries_in(&self, category: Category) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(move |e| e.category == category)
    }
}

/// Optional post-filters applied on top of raw extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    /// Drop entries whose absolute value exceeds this bound.
    pub max_abs_value: Option<f64>,
    /// Keep only the first entry per item name within a category.
    pub dedup: bool,
}

/// Byte range of one category subsection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBlock {
    pub category: Category,
    pub label: Range<usize>,
    pub body: Range<usize>,
}

/// Where the section and its subsections sit in the document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    pub marker: Range<usize>,
    pub body: Range<usize>,
    /// Only the categories whose label was found, in category order.
    pub blocks: Vec<CategoryBlock>,
}

/// An entry together with the byte range it was matched from.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedEntry {
    pub entry: Entry,
    pub span: Range<usize>,
}

/// Raw scan output before post-filters and date derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionScan {
    pub layout: SectionLayout,
    pub entries: Vec<LocatedEntry>,
    pub skipped: usize,
}

// --- Main Extractor Structure ---
#[derive(Debug, Clone, Default)]
pub struct TrendExtractor {
    config: ExtractorConfig,
}

impl TrendExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extracts the trend strength entries from `document_text`.
    ///
    /// `file_name` is only used to derive the report date. The only hard
    /// failure is a missing section marker; every other irregularity shrinks
    /// the result instead.
    pub fn extract(
        &self,
        document_text: &str,
        file_name: Option<&str>,
    ) -> Result<ExtractionResult, ExtractError> {
        let scan = self.scan(document_text)?;
        let mut skipped = scan.skipped;

        let mut seen: HashSet<(Category, String)> = HashSet::new();
        let mut entries = Vec::with_capacity(scan.entries.len());
        for LocatedEntry { entry, .. } in scan.entries {
            if let Some(bound) = self.config.max_abs_value {
                if entry.value.abs() > bound {
                    tracing::debug!("Dropping {} ({}): outside ±{}", entry.item_name, entry.value, bound);
                    skipped += 1;
                    continue;
                }
            }
            if self.config.dedup && !seen.insert((entry.category, entry.item_name.clone())) {
                tracing::debug!("Dropping duplicate {} under {}", entry.item_name, entry.category);
                continue;
            }
            entries.push(entry);
        }

        let date = file_name.and_then(derive_date);

        tracing::debug!(
            "Extracted {} entries ({} skipped), date {:?}",
            entries.len(),
            skipped,
            date
        );
        Ok(ExtractionResult { entries, date, skipped })
    }

    /// Locates the section and matches every entry shape, without filtering.
    pub fn scan(&self, document_text: &str) -> Result<SectionScan, ExtractError> {
        let layout = self.locate(document_text)?;

        let mut entries = Vec::new();
        let mut skipped = 0;
        for block in &layout.blocks {
            skipped += scan_block(document_text, block, &mut entries);
        }

        Ok(SectionScan { layout, entries, skipped })
    }

    /// Finds the section marker, the section boundary and the category labels.
    pub fn locate(&self, document_text: &str) -> Result<SectionLayout, ExtractError> {
        let marker = SECTION_MARKER_RE
            .find(document_text)
            .ok_or_else(|| ExtractError::SectionNotFound("no 【趋势强度】 marker in document".to_string()))?;

        let body_start = marker.end();
        let body_end = SECTION_END_RE
            .find(&document_text[body_start..])
            .map(|m| body_start + m.start())
            .unwrap_or(document_text.len());
        tracing::debug!(
            "Found section marker at {}; section body spans {}..{}",
            marker.start(),
            body_start,
            body_end
        );

        // Labels are matched in category order, each after the previous one found.
        let mut labels: Vec<(Category, Range<usize>)> = Vec::with_capacity(3);
        let mut cursor = body_start;
        for (category, re) in Category::ALL.iter().zip(CATEGORY_LABEL_RE.iter()) {
            match re.find(&document_text[cursor..body_end]) {
                Some(m) => {
                    let label = cursor + m.start()..cursor + m.end();
                    tracing::trace!("Found {} label at {:?}", category, label);
                    cursor = label.end;
                    labels.push((*category, label));
                }
                None => tracing::debug!("No {} subsection in section", category),
            }
        }

        let blocks = labels
            .iter()
            .enumerate()
            .map(|(i, (category, label))| {
                let end = labels.get(i + 1).map(|(_, next)| next.start).unwrap_or(body_end);
                CategoryBlock {
                    category: *category,
                    label: label.clone(),
                    body: label.end..end,
                }
            })
            .collect();

        Ok(SectionLayout {
            marker: marker.range(),
            body: body_start..body_end,
            blocks,
        })
    }
}

/// Matches entries inside one subsection, appending them to `out`.
/// Returns how many non-blank segments (or malformed entries) were skipped.
fn scan_block(text: &str, block: &CategoryBlock, out: &mut Vec<LocatedEntry>) -> usize {
    let body = &text[block.body.clone()];
    let mut skipped = 0;

    let mut segment_start = 0;
    let separators = SEGMENT_SEPARATOR_RE
        .find_iter(body)
        .map(|m| (m.start(), m.end()))
        .chain(std::iter::once((body.len(), body.len())));

    for (sep_start, sep_end) in separators {
        let raw = &body[segment_start..sep_start];
        let offset = block.body.start + segment_start + (raw.len() - raw.trim_start().len());
        segment_start = sep_end;

        let segment = raw.trim();
        if segment.is_empty() {
            continue;
        }
        skipped += scan_segment(segment, offset, block.category, out);
    }

    skipped
}

fn scan_segment(segment: &str, offset: usize, category: Category, out: &mut Vec<LocatedEntry>) -> usize {
    let mut skipped = 0;
    let mut matched_any = false;

    for caps in PAREN_ENTRY_RE.captures_iter(segment) {
        matched_any = true;
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        if !push_entry(&caps["name"], &caps["value"], category, offset + whole.start..offset + whole.end, out) {
            skipped += 1;
        }
    }
    if matched_any {
        return skipped;
    }

    if let Some(caps) = COLON_ENTRY_RE.captures(segment) {
        if push_entry(&caps["name"], &caps["value"], category, offset..offset + segment.len(), out) {
            return 0;
        }
        return 1;
    }

    tracing::trace!("Skipping unmatched segment under {}: '{}'", category, segment);
    1
}

fn push_entry(name: &str, raw_value: &str, category: Category, span: Range<usize>, out: &mut Vec<LocatedEntry>) -> bool {
    let item_name = name.trim();
    if item_name.is_empty() {
        return false;
    }
    let Some(value) = parse_value(raw_value) else {
        tracing::trace!("Skipping {} under {}: malformed value '{}'", item_name, category, raw_value);
        return false;
    };
    tracing::trace!("Matched {} = {} under {}", item_name, value, category);
    out.push(LocatedEntry {
        entry: Entry {
            item_name: item_name.to_string(),
            value,
            category,
        },
        span,
    });
    true
}

/// Parses a signed decimal such as `+2.5`, `-1`, `0.0` or `.5`.
/// Full-width and typographic signs from PDF text layers are normalized first.
pub fn parse_value(raw: &str) -> Option<f64> {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '＋' => '+',
            '－' | '−' | '–' => '-',
            '．' => '.',
            other => other,
        })
        .collect();
    if !NUMBER_RE.is_match(&normalized) {
        return None;
    }
    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    // Collapse -0.0 so exports never print a signed zero.
    Some(if value == 0.0 { 0.0 } else { value })
}
