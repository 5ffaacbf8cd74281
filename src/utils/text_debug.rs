// src/utils/text_debug.rs
use crate::extractors::SectionScan;
use crate::utils::error::AppError;
use std::fs::File;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

/// What a highlighted span is; rendered as the tag inside `⟦tag:…⟧`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Marker,
    Label,
    Entry,
    End,
}

impl Highlight {
    fn tag(&self) -> &'static str {
        match self {
            Highlight::Marker => "section",
            Highlight::Label => "label",
            Highlight::Entry => "entry",
            Highlight::End => "end",
        }
    }
}

/// Renders `text` with each highlighted span wrapped as `⟦tag:…⟧`.
/// Overlapping spans after the first are dropped.
pub fn annotate(text: &str, highlights: &[(Range<usize>, Highlight)]) -> String {
    let mut sorted = highlights.to_vec();
    sorted.sort_by_key(|(range, _)| (range.start, range.end));

    let mut out = String::with_capacity(text.len() + highlights.len() * 12);
    let mut last_pos = 0;
    for (range, kind) in sorted {
        if range.start < last_pos || range.end > text.len() {
            continue;
        }
        out.push_str(&text[last_pos..range.start]);
        if range.is_empty() {
            out.push_str(&format!("⟦{}⟧", kind.tag()));
        } else {
            out.push_str(&format!("⟦{}:{}⟧", kind.tag(), &text[range.clone()]));
        }
        last_pos = range.end;
    }
    out.push_str(&text[last_pos..]);
    out
}

/// Collects the spans the extractor located: marker, labels, entries and the
/// point where the section ends.
pub fn scan_highlights(scan: &SectionScan) -> Vec<(Range<usize>, Highlight)> {
    let layout = &scan.layout;
    let mut highlights = vec![(layout.marker.clone(), Highlight::Marker)];
    highlights.extend(layout.blocks.iter().map(|b| (b.label.clone(), Highlight::Label)));
    highlights.extend(scan.entries.iter().map(|e| (e.span.clone(), Highlight::Entry)));
    highlights.push((layout.body.end..layout.body.end, Highlight::End));
    highlights
}

/// Saves an annotated copy of the document text for debugging extraction.
pub fn save_debug_text(text: &str, filename: &Path, scan: &SectionScan) -> Result<(), AppError> {
    let mut file = File::create(filename)?;
    file.write_all(annotate(text, &scan_highlights(scan)).as_bytes())?;

    tracing::info!("Saved annotated text to {}", filename.display());
    Ok(())
}
