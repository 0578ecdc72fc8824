//! Text embedding: the [`Embedder`] trait and the built-in feature-hashing model.

use std::borrow::Cow;

/// Errors raised while turning text into a vector.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The input exceeds the model's limit and truncation is disabled.
    #[error("input of {len} characters exceeds model limit of {max}")]
    InputTooLong { len: usize, max: usize },

    #[error("tokenization failed: {0}")]
    Tokenize(String),

    #[error("model failure: {0}")]
    Model(String),

    #[error("embedding dimension must be non-zero")]
    ZeroDimension,

    /// The model produced a different number of vectors than inputs.
    #[error("expected {expected} embeddings, got {actual}")]
    BatchSize { expected: usize, actual: usize },
}

/// Maps text to a fixed-dimension dense vector.
///
/// Implementations are deterministic for a fixed model: equal inputs give equal vectors.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model and its parameters, persisted in snapshots.
    fn id(&self) -> String;

    fn dimension(&self) -> usize;

    /// Longest accepted input in characters, if the model has a limit.
    fn max_input_chars(&self) -> Option<usize> {
        None
    }

    /// # Errors
    ///
    /// Returns an error if the input cannot be encoded.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError>;

    /// Encode a batch; output order matches input order.
    ///
    /// # Errors
    ///
    /// Returns the first encoding error; no partial batch is returned.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Cut `text` to the embedder's character limit when `truncate` is set.
///
/// Returns the input unchanged when it already fits or the model has no limit.
#[must_use]
pub fn prepare_input<'a>(text: &'a str, embedder: &dyn Embedder, truncate: bool) -> Cow<'a, str> {
    match embedder.max_input_chars() {
        Some(max) if truncate => match text.char_indices().nth(max) {
            Some((cut, _)) => {
                tracing::debug!(max, "input truncated before embedding");
                Cow::Borrowed(&text[..cut])
            }
            None => Cow::Borrowed(text),
        },
        _ => Cow::Borrowed(text),
    }
}

/// Dependency-free embedder based on signed feature hashing.
///
/// Each token (lowercased identifier, plus its `snake_case` / `camelCase` parts) is hashed
/// with BLAKE3 into one of `dimension` buckets with a hash-derived sign. The sum is
/// L2-normalized, so texts that share more identifiers land closer together.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    max_input_chars: Option<usize>,
}

impl HashEmbedder {
    /// # Errors
    ///
    /// Returns [`EncodingError::ZeroDimension`] if `dimension` is 0.
    pub fn new(dimension: usize) -> Result<Self, EncodingError> {
        if dimension == 0 {
            return Err(EncodingError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            max_input_chars: None,
        })
    }

    #[must_use]
    pub fn with_max_input_chars(mut self, max: usize) -> Self {
        self.max_input_chars = Some(max);
        self
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bucket(&self, token: &str) -> (usize, f32) {
        let hash = blake3::hash(token.as_bytes());
        let bytes = hash.as_bytes();
        let mut head = [0u8; 8];
        head.copy_from_slice(&bytes[..8]);
        let slot = (u64::from_le_bytes(head) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (slot, sign)
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> String {
        format!("hash-v1:d{}", self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_input_chars(&self) -> Option<usize> {
        self.max_input_chars
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        if let Some(max) = self.max_input_chars {
            let len = text.chars().count();
            if len > max {
                return Err(EncodingError::InputTooLong { len, max });
            }
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let (slot, sign) = self.bucket(&token);
            vector[slot] += sign;
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

fn tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().any(char::is_alphanumeric))
    {
        out.push(word.to_lowercase());
        let parts = identifier_parts(word);
        if parts.len() > 1 {
            out.extend(parts.into_iter().map(|p| p.to_lowercase()));
        }
    }
    out
}

/// Split `parseHTTPRequest_v2` into `parse`, `HTTP`, `Request`, `v2`.
fn identifier_parts(word: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for piece in word.split('_').filter(|p| !p.is_empty()) {
        let chars: Vec<(usize, char)> = piece.char_indices().collect();
        let mut start = 0;
        for i in 1..chars.len() {
            let (idx, c) = chars[i];
            let prev = chars[i - 1].1;
            let next_lower = chars.get(i + 1).is_some_and(|&(_, n)| n.is_lowercase());
            let after_word = prev.is_lowercase() || prev.is_numeric();
            let boundary = c.is_uppercase() && (after_word || (prev.is_uppercase() && next_lower));
            if boundary {
                parts.push(&piece[start..idx]);
                start = idx;
            }
        }
        parts.push(&piece[start..]);
    }
    parts
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
