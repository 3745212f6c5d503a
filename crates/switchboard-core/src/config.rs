use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FlowError, Result};

/// Top-level Switchboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub orders: Option<ServiceConfig>,
    #[serde(default)]
    pub retrieval: Option<RetrievalConfig>,
    #[serde(default)]
    pub vision: Option<ServiceConfig>,
}

/// Graph execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Attempts per node before escalating or backtracking.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Forwarded to nodes; model-routed nodes ask the provider to store the exchange.
    #[serde(default = "default_trace")]
    pub trace: bool,
    /// How many times one node may run within a single turn.
    #[serde(default = "default_max_node_visits")]
    pub max_node_visits: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            trace: default_trace(),
            max_node_visits: default_max_node_visits(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_trace() -> bool { true }
fn default_max_node_visits() -> usize { 5 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl ModelConfig {
    /// Minimal config for a model id with provider defaults.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            provider: default_provider(),
            model_id: model_id.into(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

fn default_provider() -> String { "openai".to_string() }

/// Provider names served by the chat-completions client. Anything other
/// than `openai` must set `base_url`.
pub const OPENAI_COMPATIBLE_PROVIDERS: &[&str] =
    &["openai", "azure", "ollama", "vllm", "groq", "openrouter", "compatible"];

impl ModelConfig {
    fn validate(&self, section: &str) -> Result<()> {
        if !OPENAI_COMPATIBLE_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(FlowError::Config(format!(
                "{section}.provider '{}' is not supported (expected one of: {})",
                self.provider,
                OPENAI_COMPATIBLE_PROVIDERS.join(", ")
            )));
        }
        if self.provider != "openai" && self.base_url.is_none() {
            return Err(FlowError::Config(format!(
                "{section}.base_url is required for provider '{}'",
                self.provider
            )));
        }
        Ok(())
    }
}
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_llm_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_llm_max_retries() -> u32 { 2 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// An HTTP collaborator (order management, image analysis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Retrieval service and the collections the support flow reads from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_policy_collection")]
    pub policy_collection: String,
    #[serde(default = "default_shop_collection")]
    pub shop_collection: String,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where the mock order API listens when `[orders]` is absent.
pub const DEFAULT_ORDERS_URL: &str = "http://127.0.0.1:8000";

/// Where the retrieval service listens when `[retrieval]` is absent.
pub const DEFAULT_RETRIEVAL_URL: &str = "http://127.0.0.1:8100";

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RETRIEVAL_URL.to_string(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            policy_collection: default_policy_collection(),
            shop_collection: default_shop_collection(),
        }
    }
}

fn default_timeout_secs() -> u64 { 30 }
fn default_policy_collection() -> String { "policies".to_string() }
fn default_shop_collection() -> String { "shop".to_string() }

impl AppConfig {
    /// The `[orders]` section, or the local mock order API.
    pub fn orders_or_default(&self) -> ServiceConfig {
        self.orders
            .clone()
            .unwrap_or_else(|| ServiceConfig::new(DEFAULT_ORDERS_URL))
    }

    /// The `[retrieval]` section, or the local retrieval service.
    pub fn retrieval_or_default(&self) -> RetrievalConfig {
        self.retrieval.clone().unwrap_or_default()
    }

    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowError::ConfigNotFound(path.display().to_string()))?;

        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), model = %config.model.model_id, "Loaded config");
        Ok(config)
    }

    /// Parse config text, expanding `${ENV_VAR}` references first.
    pub fn from_toml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self =
            toml::from_str(&expanded).map_err(|e| FlowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.model.validate("model")?;
        for fallback in &self.fallback_models {
            fallback.validate("fallback_models")?;
        }
        if self.engine.max_retries == 0 {
            return Err(FlowError::Config(
                "engine.max_retries must be at least 1".into(),
            ));
        }
        if self.engine.max_node_visits == 0 {
            return Err(FlowError::Config(
                "engine.max_node_visits must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Expand `${ENV_VAR}` patterns; unset variables are left as written.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(val) => result.push_str(&val),
                    Err(_) => {
                        result.push_str("${");
                        result.push_str(name);
                        result.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_SWITCHBOARD_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_SWITCHBOARD_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_SWITCHBOARD_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_SWITCHBOARD_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_SWITCHBOARD_VAR}\"");
    }

    #[test]
    fn test_expand_env_vars_unterminated() {
        assert_eq!(expand_env_vars("a = \"${OOPS\""), "a = \"${OOPS\"");
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config = AppConfig::from_toml(
            r#"
[model]
model_id = "gpt-4.1"
"#,
        )
        .unwrap();
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.engine.max_retries, 3);
        assert!(config.engine.trace);
        assert_eq!(config.engine.max_node_visits, 5);
        assert!(config.orders.is_none());
        assert!(config.retrieval.is_none());
        assert!(config.fallback_models.is_empty());
    }

    #[test]
    fn test_retrieval_collection_defaults() {
        let config = AppConfig::from_toml(
            r#"
[model]
model_id = "gpt-4.1"

[retrieval]
base_url = "http://127.0.0.1:8100"
"#,
        )
        .unwrap();
        let retrieval = config.retrieval.unwrap();
        assert_eq!(retrieval.policy_collection, "policies");
        assert_eq!(retrieval.shop_collection, "shop");
        assert_eq!(retrieval.timeout_secs, 30);
    }

    #[test]
    fn test_zero_retries_rejected() {
        let err = AppConfig::from_toml(
            r#"
[model]
model_id = "gpt-4.1"

[engine]
max_retries = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = AppConfig::from_toml(
            r#"
[model]
provider = "anthropic"
model_id = "claude-sonnet-4"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn test_compatible_provider_needs_base_url() {
        let err = AppConfig::from_toml(
            r#"
[model]
provider = "ollama"
model_id = "llama3"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("model.base_url"));

        let config = AppConfig::from_toml(
            r#"
[model]
provider = "ollama"
model_id = "llama3"
base_url = "http://localhost:11434/v1/chat/completions"
"#,
        )
        .unwrap();
        assert_eq!(config.model.provider, "ollama");
    }

    #[test]
    fn test_fallback_provider_checked() {
        let err = AppConfig::from_toml(
            r#"
[model]
model_id = "gpt-4.1"

[[fallback_models]]
provider = "bedrock"
model_id = "some-model"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("fallback_models.provider"));
    }
}
