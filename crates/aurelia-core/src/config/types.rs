use serde::{Deserialize, Serialize};

use crate::secret::Secret;

/// Chat-completion backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Ollama,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedding model selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Hash,
    Candle,
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_max_tokens() -> u32 {
    2048
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,
    /// Vector size for the hash backend. The candle backend reports its own.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_device")]
    pub device: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            dimension: default_dimension(),
            max_input_chars: default_max_input_chars(),
            model: default_embedding_model(),
            device: default_device(),
        }
    }
}

fn default_dimension() -> usize {
    384
}

fn default_max_input_chars() -> usize {
    32_768
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".into()
}

fn default_device() -> String {
    "cpu".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_true")]
    pub structural_summary: bool,
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
    #[serde(default)]
    pub follow_links: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            structural_summary: true,
            respect_gitignore: true,
            follow_links: false,
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["py".into()]
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_true")]
    pub truncate_inputs: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            truncate_inputs: true,
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
}
