// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error reading document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to extract PDF text: {0}")]
    Pdf(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("No documents found in {0}")]
    NoDocuments(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Section not found: {0}")]
    SectionNotFound(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Existing pivot table is malformed: {0}")]
    InvalidPivot(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Document loading failed: {0}")]
    Document(#[from] DocumentError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
