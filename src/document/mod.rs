//! Document ingestion: file-type text extraction and chunking.

pub mod chunker;
pub mod loader;

pub use chunker::{Chunker, ChunkerConfig, DocumentChunk};
pub use loader::parse_document;
