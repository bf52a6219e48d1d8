pub mod answer;
pub mod core;
pub mod document;
pub mod llm;
pub mod retrieval;
pub mod server;
pub mod state;
