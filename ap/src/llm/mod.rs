//! LLM client module for agentpipe
//!
//! Backs the externally-sourced variant of the stage workers.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Only "anthropic" is supported.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::UnsupportedProvider(other.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_anthropic() {
        let config = LlmConfig::default();
        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn test_create_client_unknown_provider() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            ..Default::default()
        };
        let err = create_client(&config).err().unwrap();
        assert!(matches!(err, LlmError::UnsupportedProvider(p) if p == "openai"));
    }
}
