//! Query-time retrieval: embed the question, search the index, assemble context.

use std::sync::Arc;

use serde::Serialize;

use crate::embedder::{Embedder, prepare_input};
use crate::error::{RagError, Result};
use crate::snapshot::CorpusSnapshot;

/// Separator placed between retrieved documents in the assembled context.
pub const CONTEXT_DELIMITER: &str = "\n\n### NEW FILE ###\n\n";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    /// Full document text, header included.
    pub text: String,
    pub source: String,
    /// Squared L2 distance to the query vector.
    pub distance: f32,
}

/// Result of a retrieval. `indexed == false` marks the "nothing built yet" state,
/// which is distinct from a search that found no hits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Retrieval {
    /// Hits nearest first.
    pub hits: Vec<RetrievalHit>,
    /// Hit texts joined by [`CONTEXT_DELIMITER`].
    pub context: String,
    pub indexed: bool,
}

impl Retrieval {
    #[must_use]
    pub fn not_indexed() -> Self {
        Self {
            hits: Vec::new(),
            context: String::new(),
            indexed: false,
        }
    }

    #[must_use]
    pub fn from_hits(hits: Vec<RetrievalHit>) -> Self {
        let context = hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_DELIMITER);
        Self {
            hits,
            context,
            indexed: true,
        }
    }

    /// Source paths of the hits, nearest first.
    #[must_use]
    pub fn sources(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.source.clone()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Embeds queries with the same model used at build time and searches a snapshot.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    truncate_inputs: bool,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.id())
            .field("truncate_inputs", &self.truncate_inputs)
            .finish()
    }
}

impl Retriever {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, truncate_inputs: bool) -> Self {
        Self {
            embedder,
            truncate_inputs,
        }
    }

    /// Return up to `top_k` documents nearest to `query`.
    ///
    /// With no snapshot the result is [`Retrieval::not_indexed`]. An empty snapshot
    /// yields an indexed result with no hits.
    ///
    /// # Errors
    ///
    /// Returns an error if `top_k` is 0, the snapshot came from another embedder, or
    /// encoding the query fails.
    pub fn retrieve(
        &self,
        snapshot: Option<&CorpusSnapshot>,
        query: &str,
        top_k: usize,
    ) -> Result<Retrieval> {
        if top_k == 0 {
            return Err(RagError::InvalidTopK);
        }
        let Some(snapshot) = snapshot else {
            return Ok(Retrieval::not_indexed());
        };
        snapshot.ensure_embedder(&self.embedder.id())?;

        if snapshot.is_empty() {
            return Ok(Retrieval::from_hits(Vec::new()));
        }

        let input = prepare_input(query, self.embedder.as_ref(), self.truncate_inputs);
        let vector = self.embedder.embed(&input)?;
        let neighbors = snapshot.index().search(vector.as_slice(), top_k)?;

        let documents = snapshot.documents();
        let hits: Vec<RetrievalHit> = neighbors
            .into_iter()
            .filter_map(|n| {
                let Some(doc) = documents.get(n.position) else {
                    tracing::debug!(position = n.position, "skipping stale index position");
                    return None;
                };
                Some(RetrievalHit {
                    text: doc.text.clone(),
                    source: doc.source.clone(),
                    distance: n.distance,
                })
            })
            .collect();

        tracing::debug!(top_k, hits = hits.len(), "retrieval complete");
        Ok(Retrieval::from_hits(hits))
    }
}
