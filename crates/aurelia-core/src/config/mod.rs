mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use aurelia_index::{LoaderConfig, RagConfig};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Pull credentials from the environment. They never come from the config file.
    pub fn resolve_secrets(&mut self) {
        self.secrets.openai_api_key = crate::secret::from_env("AURELIA_OPENAI_API_KEY");
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be at least 1");
        }
        if self.index.extensions.iter().all(|e| e.trim().is_empty()) {
            bail!("index.extensions must list at least one extension");
        }
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be non-zero");
        }
        if self.embedding.max_input_chars == 0 {
            bail!("embedding.max_input_chars must be non-zero");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!(
                "llm.temperature must be within [0, 2], got {}",
                self.llm.temperature
            );
        }
        Ok(())
    }

    /// Loader and orchestrator settings derived from `[index]` and `[retrieval]`.
    #[must_use]
    pub fn rag_config(&self) -> RagConfig {
        RagConfig {
            loader: LoaderConfig {
                extensions: self
                    .index
                    .extensions
                    .iter()
                    .map(|e| e.trim().trim_start_matches('.').to_owned())
                    .filter(|e| !e.is_empty())
                    .collect(),
                structural_summary: self.index.structural_summary,
                respect_gitignore: self.index.respect_gitignore,
                follow_links: self.index.follow_links,
            },
            top_k: self.retrieval.top_k,
            truncate_inputs: self.retrieval.truncate_inputs,
        }
    }
}
