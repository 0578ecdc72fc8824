//! Retrieval-augmented question answering over a local source tree.
//!
//! Pipeline: [`loader`] walks a directory into [`document::Document`]s, an
//! [`embedder::Embedder`] turns each one into a fixed-size vector, a
//! [`vector::FlatL2Index`] holds the vectors for exact nearest-neighbour search,
//! and [`orchestrator::RagOrchestrator`] ties the pieces together behind
//! `build` / `retrieve` / `answer`.

#[cfg(feature = "candle")]
pub mod candle;
pub mod document;
pub mod embedder;
pub mod error;
pub mod languages;
pub mod loader;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;
pub mod snapshot;
pub mod structure;
pub mod vector;

pub use document::Document;
pub use embedder::{EncodingError, Embedder, HashEmbedder};
pub use error::{RagError, Result};
pub use loader::{CorpusLoader, LoadWarning, LoadedCorpus, LoaderConfig, WarningKind};
pub use orchestrator::{Answer, BuildReport, IndexState, RagConfig, RagOrchestrator};
pub use retriever::{Retrieval, RetrievalHit, Retriever};
pub use snapshot::{CorpusSnapshot, SnapshotError};
pub use vector::{FlatL2Index, IndexError, Neighbor};
