// src/documents/models.rs
use std::path::{Path, PathBuf};

/// Kind of input file, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Returns the kind for a path, or `None` for anything we cannot read.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" => Some(DocumentKind::Text),
            _ => None,
        }
    }
}

/// A loaded report: its original file name plus the plain text to extract from.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub file_name: String,
    pub kind: DocumentKind,
    pub text: String,
}

impl SourceDocument {
    /// File name without extension; used to name per-document outputs.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(self.file_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("a/report.PDF")), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path(Path::new("report.txt")), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_path(Path::new("report.docx")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }
}
