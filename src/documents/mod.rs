// src/documents/mod.rs
pub mod loader;
pub mod models;

pub use loader::{collect_inputs, load_document};
pub use models::SourceDocument;
