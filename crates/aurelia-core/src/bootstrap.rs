//! Build providers, embedders, and the orchestrator from a loaded [`Config`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};

use aurelia_index::{Embedder, HashEmbedder, RagOrchestrator};
use aurelia_llm::AnyProvider;
use aurelia_llm::ollama::OllamaProvider;
use aurelia_llm::openai::OpenAiProvider;

use crate::config::{Config, EmbeddingBackend, ProviderKind};

/// Priority: `--config` argument > `AURELIA_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("AURELIA_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// Load, resolve secrets, and validate in one step.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed or a setting is invalid.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(path)?;
    config.resolve_secrets();
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// # Errors
///
/// Returns an error if the `OpenAI` backend is selected without an API key.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    tracing::info!(
        provider = %llm.provider,
        model = %llm.model,
        "generation provider configured"
    );
    match llm.provider {
        ProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("AURELIA_OPENAI_API_KEY not found")?
                .expose()
                .to_owned();
            let provider = OpenAiProvider::new(
                api_key,
                llm.base_url.clone(),
                llm.model.clone(),
                llm.max_tokens,
            )
            .with_temperature(llm.temperature);
            Ok(AnyProvider::OpenAi(provider))
        }
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            llm.model.clone(),
        ))),
    }
}

/// # Errors
///
/// Returns an error if the configured backend cannot be constructed or was compiled out.
pub fn create_embedder(config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    let emb = &config.embedding;
    match emb.backend {
        EmbeddingBackend::Hash => {
            let embedder = HashEmbedder::new(emb.dimension)
                .context("invalid hash embedder settings")?
                .with_max_input_chars(emb.max_input_chars);
            Ok(Arc::new(embedder))
        }
        EmbeddingBackend::Candle => create_candle_embedder(config),
    }
}

#[cfg(feature = "candle")]
fn create_candle_embedder(config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    let device = select_device(&config.embedding.device)?;
    let embedder = aurelia_index::candle::CandleEmbedder::load(&config.embedding.model, &device)
        .with_context(|| format!("failed to load embedding model {}", config.embedding.model))?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "candle"))]
fn create_candle_embedder(_config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    bail!("embedding.backend = \"candle\" requires building with the candle feature")
}

/// # Errors
///
/// Returns an error if the requested accelerator was not compiled in or fails to open.
#[cfg(feature = "candle")]
pub fn select_device(preference: &str) -> anyhow::Result<aurelia_index::candle::Device> {
    use aurelia_index::candle::Device;
    match preference {
        "metal" => {
            #[cfg(feature = "metal")]
            return Ok(Device::new_metal(0)?);
            #[cfg(not(feature = "metal"))]
            bail!("candle compiled without metal feature");
        }
        "cuda" => {
            #[cfg(feature = "cuda")]
            return Ok(Device::new_cuda(0)?);
            #[cfg(not(feature = "cuda"))]
            bail!("candle compiled without cuda feature");
        }
        "auto" => {
            #[cfg(feature = "metal")]
            if let Ok(device) = Device::new_metal(0) {
                return Ok(device);
            }
            #[cfg(feature = "cuda")]
            if let Ok(device) = Device::new_cuda(0) {
                return Ok(device);
            }
            Ok(Device::Cpu)
        }
        _ => Ok(Device::Cpu),
    }
}

/// # Errors
///
/// Returns an error if the embedder cannot be created.
pub fn create_orchestrator(config: &Config) -> anyhow::Result<RagOrchestrator> {
    let embedder = create_embedder(config)?;
    tracing::debug!(embedder = %embedder.id(), "embedder ready");
    Ok(RagOrchestrator::new(embedder, config.rag_config()))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::secret::Secret;
    use aurelia_llm::LlmProvider;

    #[test]
    fn cli_path_wins() {
        let path = resolve_config_path(Some(Path::new("/etc/aurelia.toml")));
        assert_eq!(path, PathBuf::from("/etc/aurelia.toml"));
    }

    #[test]
    #[serial]
    fn env_path_then_default() {
        unsafe { std::env::set_var("AURELIA_CONFIG", "/tmp/from-env.toml") };
        assert_eq!(resolve_config_path(None), PathBuf::from("/tmp/from-env.toml"));
        unsafe { std::env::remove_var("AURELIA_CONFIG") };
        assert_eq!(resolve_config_path(None), PathBuf::from("config/default.toml"));
    }

    #[test]
    fn openai_requires_key() {
        let config = Config::default();
        let err = create_provider(&config).unwrap_err();
        assert!(err.to_string().contains("AURELIA_OPENAI_API_KEY"));
    }

    #[test]
    fn openai_with_key() {
        let mut config = Config::default();
        config.secrets.openai_api_key = Some(Secret::new("sk-test"));
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
        let AnyProvider::OpenAi(openai) = provider else {
            panic!("expected the OpenAI backend");
        };
        assert_eq!(openai.model(), "gpt-4o-mini");
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::Ollama;
        config.llm.base_url = "http://localhost:11434".into();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn hash_embedder_from_config() {
        let mut config = Config::default();
        config.embedding.dimension = 128;
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), 128);
        assert_eq!(embedder.id(), "hash-v1:d128");
        assert_eq!(embedder.max_input_chars(), Some(32_768));
    }

    #[cfg(not(feature = "candle"))]
    #[test]
    fn candle_backend_requires_feature() {
        let mut config = Config::default();
        config.embedding.backend = EmbeddingBackend::Candle;
        let err = create_embedder(&config).err().unwrap();
        assert!(err.to_string().contains("candle feature"));
    }

    #[cfg(feature = "candle")]
    #[test]
    fn select_device_unknown_defaults_to_cpu() {
        let device = select_device("unknown").unwrap();
        assert!(matches!(device, aurelia_index::candle::Device::Cpu));
    }

    #[tokio::test]
    async fn orchestrator_starts_uninitialized() {
        let rag = create_orchestrator(&Config::default()).unwrap();
        assert_eq!(rag.state().await, aurelia_index::IndexState::Uninitialized);
        assert_eq!(rag.config().top_k, 3);
    }
}
