//! Build and query lifecycle over one atomically replaced corpus snapshot.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use aurelia_llm::LlmProvider;

use crate::embedder::{EncodingError, Embedder, prepare_input};
use crate::error::{RagError, Result};
use crate::loader::{CorpusLoader, LoadWarning, LoadedCorpus, LoaderConfig};
use crate::prompt::grounded_messages;
use crate::retriever::{Retrieval, Retriever};
use crate::snapshot::CorpusSnapshot;
use crate::vector::FlatL2Index;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagConfig {
    pub loader: LoaderConfig,
    /// Documents retrieved per `answer` call.
    pub top_k: usize,
    /// Cut over-long inputs to the embedder's limit instead of failing.
    pub truncate_inputs: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            top_k: 3,
            truncate_inputs: true,
        }
    }
}

/// Summary of a successful build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub indexed_count: usize,
    pub skipped_count: usize,
    pub parse_failures: usize,
    pub warnings: Vec<LoadWarning>,
    pub dimension: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Source identifiers of the documents given to the model, nearest first.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexState {
    Uninitialized,
    Indexed { documents: usize },
}

/// Owns the current [`CorpusSnapshot`] and exposes `build`, `retrieve`, and `answer`.
///
/// Builds are serialized. Queries never wait for a build: they read whichever
/// snapshot is current, and a finished build replaces it in one swap.
pub struct RagOrchestrator {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    config: RagConfig,
    snapshot: RwLock<Option<Arc<CorpusSnapshot>>>,
    build_lock: Mutex<()>,
}

impl std::fmt::Debug for RagOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagOrchestrator")
            .field("embedder", &self.embedder.id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RagOrchestrator {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, config: RagConfig) -> Self {
        let retriever = Retriever::new(Arc::clone(&embedder), config.truncate_inputs);
        Self {
            embedder,
            retriever,
            config,
            snapshot: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Load, embed, and index everything under `root`, then replace the current snapshot.
    ///
    /// Every call starts from scratch. On error the previous snapshot stays in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is missing, any document fails to encode, or the
    /// blocking worker dies.
    pub async fn build(&self, root: &Path) -> Result<BuildReport> {
        let _guard = self.build_lock.lock().await;
        let start = Instant::now();
        tracing::info!(root = %root.display(), embedder = %self.embedder.id(), "build started");

        let loader = CorpusLoader::new(self.config.loader.clone());
        let embedder = Arc::clone(&self.embedder);
        let truncate = self.config.truncate_inputs;
        let root_buf = root.to_path_buf();

        let (snapshot, corpus) = tokio::task::spawn_blocking(move || {
            build_snapshot(&loader, embedder.as_ref(), &root_buf, truncate)
        })
        .await
        .map_err(|e| RagError::Worker(e.to_string()))??;

        let mut report = BuildReport {
            indexed_count: snapshot.len(),
            skipped_count: corpus.skipped(),
            parse_failures: corpus.parse_failures(),
            warnings: corpus.warnings,
            dimension: snapshot.index().dimension(),
            duration_ms: 0,
        };

        *self.snapshot.write().await = Some(Arc::new(snapshot));

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            indexed = report.indexed_count,
            skipped = report.skipped_count,
            parse_failures = report.parse_failures,
            duration_ms = report.duration_ms,
            "build finished"
        );
        Ok(report)
    }

    /// Replace the current snapshot with one loaded from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot was built with a different embedder.
    pub async fn install_snapshot(&self, snapshot: CorpusSnapshot) -> Result<()> {
        snapshot.ensure_embedder(&self.embedder.id())?;
        let _guard = self.build_lock.lock().await;
        tracing::info!(documents = snapshot.len(), "snapshot installed");
        *self.snapshot.write().await = Some(Arc::new(snapshot));
        Ok(())
    }

    /// Current snapshot, if any build has succeeded.
    pub async fn snapshot(&self) -> Option<Arc<CorpusSnapshot>> {
        self.snapshot.read().await.clone()
    }

    pub async fn state(&self) -> IndexState {
        match self.snapshot.read().await.as_deref() {
            Some(s) => IndexState::Indexed {
                documents: s.len(),
            },
            None => IndexState::Uninitialized,
        }
    }

    /// Nearest documents for `query`. Before the first build this returns
    /// [`Retrieval::not_indexed`] rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if `top_k` is 0 or encoding the query fails.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Retrieval> {
        let snapshot = self.snapshot().await;
        let retriever = self.retriever.clone();
        let query = query.to_owned();
        tokio::task::spawn_blocking(move || retriever.retrieve(snapshot.as_deref(), &query, top_k))
            .await
            .map_err(|e| RagError::Worker(e.to_string()))?
    }

    /// Answer `question` from the `top_k` nearest documents with a single generation call.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotIndexed`] before the first build, and
    /// [`RagError::Generation`] if the provider fails. The provider is never retried.
    pub async fn answer<P: LlmProvider>(&self, provider: &P, question: &str) -> Result<Answer> {
        let retrieval = self.retrieve(question, self.config.top_k).await?;
        if !retrieval.indexed {
            return Err(RagError::NotIndexed);
        }

        let messages = grounded_messages(&retrieval.context, question);
        tracing::debug!(
            provider = provider.name(),
            sources = retrieval.hits.len(),
            context_len = retrieval.context.len(),
            "requesting grounded answer"
        );
        let text = provider.chat(&messages).await?;

        Ok(Answer {
            text,
            sources: retrieval.sources(),
        })
    }
}

/// Synchronous build pipeline: load, embed, index. Nothing is shared until it returns.
///
/// The returned corpus carries the load warnings; its documents have moved into the
/// snapshot.
///
/// # Errors
///
/// Returns an error if the root is missing or any document fails to encode.
pub fn build_snapshot(
    loader: &CorpusLoader,
    embedder: &dyn Embedder,
    root: &Path,
    truncate_inputs: bool,
) -> Result<(CorpusSnapshot, LoadedCorpus)> {
    let mut corpus = loader.load(root)?;

    let texts: Vec<String> = corpus
        .documents
        .iter()
        .map(|d| prepare_input(&d.text, embedder, truncate_inputs).into_owned())
        .collect();
    let vectors = if texts.is_empty() {
        Vec::new()
    } else {
        embedder.embed_batch(&texts)?
    };
    if vectors.len() != texts.len() {
        return Err(EncodingError::BatchSize {
            expected: texts.len(),
            actual: vectors.len(),
        }
        .into());
    }

    let mut index = FlatL2Index::new(embedder.dimension())?;
    index.add_batch(&vectors)?;
    tracing::debug!(vectors = index.len(), dimension = index.dimension(), "index built");

    let documents = std::mem::take(&mut corpus.documents);
    let snapshot = CorpusSnapshot::new(embedder.id(), documents, index)?;
    Ok((snapshot, corpus))
}
