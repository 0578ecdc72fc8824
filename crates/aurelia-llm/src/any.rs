#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Ollama($p) => $expr,
            AnyProvider::OpenAi($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

/// Provider chosen at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}
