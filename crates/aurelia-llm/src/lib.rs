//! Chat-completion providers used to turn retrieved source context into answers.

pub mod any;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use any::AnyProvider;
pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
