pub mod providers;
pub mod retry;

use tracing::debug;

use switchboard_core::config::{AppConfig, ModelConfig, OPENAI_COMPATIBLE_PROVIDERS};
use switchboard_core::error::{FlowError, Result};
use switchboard_core::traits::LlmClient;

pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
///
/// Every supported provider speaks the OpenAI chat-completions dialect
/// (OpenAI, Azure-compatible gateways, Ollama, vLLM, Groq, OpenRouter).
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    debug!(provider = %config.provider, model = %config.model_id, "Creating LLM client");
    match config.provider.as_str() {
        name if OPENAI_COMPATIBLE_PROVIDERS.contains(&name) => Ok(Box::new(OpenAiClient::new())),
        other => Err(FlowError::Config(format!("unsupported LLM provider: {}", other))),
    }
}

/// Build the client for an application config, wrapping it in a
/// [`RetryingClient`] when retries or fallback models are configured.
pub fn client_from_config(config: &AppConfig) -> Result<Box<dyn LlmClient>> {
    let primary = create_client(&config.model)?;
    if config.model.retry.is_none() && config.fallback_models.is_empty() {
        return Ok(primary);
    }
    let fallbacks = config
        .fallback_models
        .iter()
        .map(|fb| Ok((fb.clone(), create_client(fb)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(RetryingClient::new(
        primary,
        fallbacks,
        config.model.retry.clone().unwrap_or_default(),
    )))
}
