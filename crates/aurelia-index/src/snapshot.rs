//! Immutable result of a build: documents plus their index, optionally persisted to disk.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::vector::FlatL2Index;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u32),

    /// The snapshot was built with a different embedding model.
    #[error("snapshot built with embedder `{found}`, current embedder is `{expected}`")]
    EmbedderMismatch { expected: String, found: String },

    #[error("snapshot holds {documents} documents but {vectors} vectors")]
    Inconsistent { documents: usize, vectors: usize },
}

/// Documents and vectors from one successful build.
///
/// Position `i` in the index always refers to `documents()[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotFile", into = "SnapshotFile")]
pub struct CorpusSnapshot {
    embedder_id: String,
    documents: Vec<Document>,
    index: FlatL2Index,
}

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u32,
    embedder_id: String,
    documents: Vec<Document>,
    index: FlatL2Index,
}

impl From<CorpusSnapshot> for SnapshotFile {
    fn from(s: CorpusSnapshot) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            embedder_id: s.embedder_id,
            documents: s.documents,
            index: s.index,
        }
    }
}

impl TryFrom<SnapshotFile> for CorpusSnapshot {
    type Error = SnapshotError;

    fn try_from(file: SnapshotFile) -> Result<Self, Self::Error> {
        if file.format_version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(file.format_version));
        }
        Self::new(file.embedder_id, file.documents, file.index)
    }
}

impl CorpusSnapshot {
    /// # Errors
    ///
    /// Returns [`SnapshotError::Inconsistent`] if document and vector counts differ.
    pub fn new(
        embedder_id: String,
        documents: Vec<Document>,
        index: FlatL2Index,
    ) -> Result<Self, SnapshotError> {
        if documents.len() != index.len() {
            return Err(SnapshotError::Inconsistent {
                documents: documents.len(),
                vectors: index.len(),
            });
        }
        Ok(Self {
            embedder_id,
            documents,
            index,
        })
    }

    #[must_use]
    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    #[must_use]
    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Fail unless this snapshot was produced by the embedder identified by `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::EmbedderMismatch`] when the identifiers differ.
    pub fn ensure_embedder(&self, expected: &str) -> Result<(), SnapshotError> {
        if self.embedder_id == expected {
            Ok(())
        } else {
            Err(SnapshotError::EmbedderMismatch {
                expected: expected.to_owned(),
                found: self.embedder_id.clone(),
            })
        }
    }

    /// Write the snapshot as JSON. The file is replaced atomically via a sibling temp file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem operation fails.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec(&SnapshotFile::from(self.clone()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!(path = %path.display(), documents = self.len(), "snapshot saved");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed, from another format version,
    /// or inconsistent.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let bytes = std::fs::read(path)?;
        let file: SnapshotFile = serde_json::from_slice(&bytes)?;
        let snapshot = Self::try_from(file)?;
        tracing::info!(
            path = %path.display(),
            documents = snapshot.len(),
            embedder = %snapshot.embedder_id,
            "snapshot loaded"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CorpusSnapshot {
        let documents = vec![
            Document::new("a.py".into(), "def a(): pass", None),
            Document::new("b.py".into(), "def b(): pass", None),
        ];
        let mut index = FlatL2Index::new(2).unwrap();
        index.add_batch(&[vec![1.0f32, 0.0], vec![0.0, 1.0]]).unwrap();
        CorpusSnapshot::new("hash-v1:d2".into(), documents, index).unwrap()
    }

    #[test]
    fn count_mismatch_rejected() {
        let index = FlatL2Index::new(2).unwrap();
        let docs = vec![Document::new("a.py".into(), "", None)];
        let err = CorpusSnapshot::new("x".into(), docs, index).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Inconsistent {
                documents: 1,
                vectors: 0
            }
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        let snapshot = sample();
        snapshot.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        let loaded = CorpusSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn unknown_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        let mut value = serde_json::to_value(sample()).unwrap();
        value["format_version"] = serde_json::json!(99);
        std::fs::write(&path, value.to_string()).unwrap();
        let err = CorpusSnapshot::load(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion(99)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CorpusSnapshot::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SnapshotError::Io(_)));
    }

    #[test]
    fn embedder_check() {
        let snapshot = sample();
        assert!(snapshot.ensure_embedder("hash-v1:d2").is_ok());
        assert!(matches!(
            snapshot.ensure_embedder("hash-v1:d384"),
            Err(SnapshotError::EmbedderMismatch { .. })
        ));
    }
}
