//! BERT sentence embeddings via candle, loaded from the Hugging Face Hub.

use std::sync::Arc;

use candle_core::{DType, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

pub use candle_core::Device;

use crate::embedder::{EncodingError, Embedder};

/// Mean-pooled, L2-normalized BERT embeddings.
#[derive(Clone)]
pub struct CandleEmbedder {
    model: Arc<BertModel>,
    tokenizer: Tokenizer,
    device: Device,
    repo_id: String,
    dimension: usize,
    max_tokens: usize,
}

impl std::fmt::Debug for CandleEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleEmbedder")
            .field("repo_id", &self.repo_id)
            .field("device", &self.device)
            .field("dimension", &self.dimension)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

fn model_err(e: impl std::fmt::Display) -> EncodingError {
    EncodingError::Model(e.to_string())
}

impl CandleEmbedder {
    /// Download (or reuse the cached) model files and load the weights.
    ///
    /// # Errors
    ///
    /// Returns an error if download, weight loading, or the dimension check fails.
    pub fn load(repo_id: &str, device: &Device) -> Result<Self, EncodingError> {
        let api = hf_hub::api::sync::Api::new()
            .map_err(|e| model_err(format!("failed to create HuggingFace API client: {e}")))?;
        let repo = api.model(repo_id.to_owned());

        let fetch = |name: &str| {
            repo.get(name)
                .map_err(|e| model_err(format!("failed to download {name} from {repo_id}: {e}")))
        };
        let config_path = fetch("config.json")?;
        let tokenizer_path = fetch("tokenizer.json")?;
        let weights_path = fetch("model.safetensors")?;

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| model_err(format!("failed to read BERT config: {e}")))?;
        let config: BertConfig = serde_json::from_str(&config_str).map_err(model_err)?;
        let max_tokens = serde_json::from_str::<serde_json::Value>(&config_str)
            .ok()
            .and_then(|v| v.get("max_position_embeddings")?.as_u64())
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(512);

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EncodingError::Tokenize(format!("failed to load tokenizer: {e}")))?;

        // SAFETY: file is a valid safetensors downloaded from hf-hub, not modified during
        // VarBuilder lifetime
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .map_err(model_err)?
        };
        let model = BertModel::load(vb, &config).map_err(model_err)?;

        let mut embedder = Self {
            model: Arc::new(model),
            tokenizer,
            device: device.clone(),
            repo_id: repo_id.to_owned(),
            dimension: 0,
            max_tokens,
        };
        embedder.dimension = embedder.forward("dimension")?.len();
        tracing::info!(
            repo = repo_id,
            dimension = embedder.dimension,
            max_tokens,
            "embedding model loaded"
        );
        Ok(embedder)
    }

    fn forward(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EncodingError::Tokenize(e.to_string()))?;

        let token_ids = encoding.get_ids();
        if token_ids.len() > self.max_tokens {
            return Err(EncodingError::InputTooLong {
                len: token_ids.len(),
                max: self.max_tokens,
            });
        }
        let token_type_ids: Vec<u32> = vec![0; token_ids.len()];

        let input_ids = Tensor::new(token_ids, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(model_err)?;
        let token_type_ids = Tensor::new(token_type_ids.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(model_err)?;

        let embeddings = self
            .model
            .forward(&input_ids, &token_type_ids, None)
            .map_err(model_err)?;

        let seq_len = u32::try_from(embeddings.dim(1).map_err(model_err)?)
            .map_err(|e| model_err(format!("sequence length overflow: {e}")))?;
        let summed = embeddings.sum(1).map_err(model_err)?;
        let pooled = (summed / f64::from(seq_len)).map_err(model_err)?;

        let norm = pooled
            .sqr()
            .and_then(|t| t.sum_keepdim(1))
            .and_then(|t| t.sqrt())
            .map_err(model_err)?;
        pooled
            .broadcast_div(&norm)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(model_err)
    }
}

impl Embedder for CandleEmbedder {
    fn id(&self) -> String {
        format!("candle:{}", self.repo_id)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    /// The hard limit is in tokens. Every token covers at least one character, so this
    /// bound (minus the two special tokens) keeps truncated input under the limit.
    fn max_input_chars(&self) -> Option<usize> {
        Some(self.max_tokens.saturating_sub(2))
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        self.forward(text)
    }
}
