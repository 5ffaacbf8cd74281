// src/documents/loader.rs
use crate::documents::models::{DocumentKind, SourceDocument};
use crate::utils::error::DocumentError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Expands the CLI inputs into a de-duplicated list of documents.
/// Directories contribute their top-level `.pdf`/`.txt` files; explicit files are
/// kept as given so an unsupported extension surfaces later as a per-file error.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, DocumentError> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && DocumentKind::from_path(p).is_some())
                .collect();
            found.sort();
            tracing::info!("Found {} documents in {}", found.len(), input.display());
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }

    let mut seen = HashSet::new();
    files.retain(|p| seen.insert(p.clone()));
    if files.is_empty() {
        let joined = inputs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(DocumentError::NoDocuments(joined));
    }
    Ok(files)
}

/// Loads one document and returns its text.
pub fn load_document(path: &Path) -> Result<SourceDocument, DocumentError> {
    let kind = DocumentKind::from_path(path)
        .ok_or_else(|| DocumentError::UnsupportedFormat(path.display().to_string()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    tracing::info!("Loading {:?} document: {}", kind, path.display());
    let text = match kind {
        DocumentKind::Pdf => extract_pdf_text(path)?,
        DocumentKind::Text => read_text(path)?,
    };
    tracing::debug!("Loaded {} characters from {}", text.chars().count(), file_name);

    if text.trim().is_empty() {
        tracing::warn!("No text extracted from {} (scanned PDF?)", path.display());
    }

    Ok(SourceDocument {
        path: path.to_path_buf(),
        file_name,
        kind,
        text,
    })
}

fn extract_pdf_text(path: &Path) -> Result<String, DocumentError> {
    let bytes = fs::read(path)?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| DocumentError::Pdf(format!("{}: {}", path.display(), e)))
}

fn read_text(path: &Path) -> Result<String, DocumentError> {
    let bytes = fs::read(path)?;
    // Text dumps saved by spreadsheet tools often carry a BOM.
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_text_document_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("morning_20240115.txt");
        fs::write(&path, "\u{feff}【趋势强度】\n偏强\n玉米(1)\n").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.file_name, "morning_20240115.txt");
        assert_eq!(doc.stem(), "morning_20240115");
        assert_eq!(doc.kind, DocumentKind::Text);
        assert!(doc.text.starts_with("【趋势强度】"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_document(Path::new("notes.docx")).unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_collect_inputs_expands_directories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_20240102.txt", "a_20240101.pdf", "ignore.csv"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let files = collect_inputs(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_20240101.pdf", "b_20240102.txt"]);
    }

    #[test]
    fn test_collect_inputs_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_inputs(&[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, DocumentError::NoDocuments(_)));
    }
}
