//! Per-session retrieval: flat vector index, bounded session registry, and
//! opt-in index snapshots.

pub mod index;
pub mod persistence;
pub mod registry;

pub use index::{FlatIndex, ScoredChunk};
pub use persistence::IndexSnapshot;
pub use registry::{SessionHandle, SessionRegistry};
