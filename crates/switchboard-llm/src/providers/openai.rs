use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use switchboard_core::config::ModelConfig;
use switchboard_core::error::{FlowError, Result};
use switchboard_core::traits::LlmClient;
use switchboard_core::types::*;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    store: bool,
}

#[derive(Serialize, Debug, PartialEq)]
pub(crate) struct OaiMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
pub(crate) struct OaiTool {
    r#type: &'static str,
    function: OaiToolDef,
}

#[derive(Serialize)]
pub(crate) struct OaiToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OaiToolCall>>,
}

#[derive(Deserialize, Debug)]
struct OaiToolCall {
    function: OaiFunction,
}

#[derive(Deserialize, Debug)]
struct OaiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

pub(crate) fn convert_tools(tools: &[ToolDefinition]) -> Vec<OaiTool> {
    tools
        .iter()
        .map(|t| OaiTool {
            r#type: "function",
            function: OaiToolDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        })
        .collect()
}

pub(crate) fn convert_messages(messages: Vec<ChatMessage>) -> Vec<OaiMessage> {
    messages
        .into_iter()
        .map(|msg| OaiMessage {
            role: match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: msg.content,
        })
        .collect()
}

fn build_request(config: &ModelConfig, request: CompletionRequest) -> ChatRequest {
    let tool_choice = if request.tools.is_empty() {
        None
    } else {
        Some(match request.tool_choice {
            ToolChoice::Auto => "auto",
            ToolChoice::Required => "required",
        })
    };

    ChatRequest {
        model: config.model_id.clone(),
        messages: convert_messages(request.messages),
        max_tokens: config.max_tokens,
        temperature: if config.temperature > 0.0 {
            Some(config.temperature)
        } else {
            None
        },
        tools: convert_tools(&request.tools),
        tool_choice,
        store: request.store,
    }
}

/// Turn the first choice into a tool call (preferred) or free text.
fn parse_response(body: &str) -> Result<Completion> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| FlowError::LlmParse(e.to_string()))?;

    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| FlowError::LlmParse("response has no choices".into()))?;

    if let Some(call) = message.tool_calls.and_then(|calls| calls.into_iter().next()) {
        let arguments = if call.function.arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                FlowError::LlmParse(format!(
                    "tool call {} has invalid arguments: {}",
                    call.function.name, e
                ))
            })?
        };
        return Ok(Completion::ToolCall {
            name: call.function.name,
            arguments,
        });
    }

    match message.content {
        Some(text) => Ok(Completion::Text(text)),
        None => Err(FlowError::LlmParse(
            "response has neither content nor tool calls".into(),
        )),
    }
}

impl LlmClient for OpenAiClient {
    fn complete(
        &self,
        config: &ModelConfig,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<Completion>> {
        let config = config.clone();

        Box::pin(async move {
            let url = config.base_url.as_deref().unwrap_or(OPENAI_API_URL);
            let body = build_request(&config, request);

            debug!(
                model = %body.model,
                messages = body.messages.len(),
                tools = body.tools.len(),
                "Sending chat completion"
            );

            let mut req = self.http.post(url).json(&body);
            if let Some(api_key) = &config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            let response = req
                .send()
                .await
                .map_err(|e| FlowError::LlmRequest(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| FlowError::LlmRequest(e.to_string()))?;

            if !status.is_success() {
                return Err(FlowError::LlmRequest(format!("HTTP {}: {}", status, text)));
            }

            parse_response(&text)
        })
    }
}
