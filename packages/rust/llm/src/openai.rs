//! OpenAI-compatible chat completions provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use evana_shared::{EvanaError, ModelSettings, Result};

use crate::message::{Message, ToolCallRequest};
use crate::provider::{ModelProvider, ModelRequest, ModelTurn, OutputMode, TokenUsage};

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("Evana/", env!("CARGO_PKG_VERSION"));

/// Maximum error body echoed into error messages.
const MAX_ERROR_SNIPPET: usize = 300;

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Chat completions over HTTP (`POST {base_url}/chat/completions`).
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Create a provider from resolved model settings.
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        Self::with_config(&settings.base_url, &settings.api_key, settings.request_timeout)
    }

    /// Create a provider with explicit connection settings.
    pub fn with_config(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| EvanaError::config("invalid model API key format"))?;
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| EvanaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn transport_error(&self, e: reqwest::Error) -> EvanaError {
        if e.is_timeout() {
            EvanaError::timeout("model request", self.timeout)
        } else {
            EvanaError::Network(format!("model request failed: {e}"))
        }
    }
}

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunctionCall,
}

#[derive(Serialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

impl From<&Message> for ApiMessage {
    fn from(m: &Message) -> Self {
        match m {
            Message::User { content } => Self {
                role: "user",
                content: content.clone(),
                tool_calls: None,
                tool_call_id: None,
            },
            Message::Assistant {
                content,
                tool_calls,
            } => Self {
                role: "assistant",
                content: content.clone(),
                tool_calls: (!tool_calls.is_empty()).then(|| {
                    tool_calls
                        .iter()
                        .map(|c| ApiToolCall {
                            id: c.id.clone(),
                            kind: "function",
                            function: ApiFunctionCall {
                                name: c.name.clone(),
                                arguments: c.arguments.clone(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: None,
            },
            Message::Tool { call_id, content } => Self {
                role: "tool",
                content: content.clone(),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
        }
    }
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

/// Build the wire request body.
fn build_body<'a>(request: &'a ModelRequest) -> ChatApiRequest<'a> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if !request.instructions.is_empty() {
        messages.push(ApiMessage {
            role: "system",
            content: request.instructions.clone(),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages.extend(request.messages.iter().map(ApiMessage::from));

    let (response_format, tools) = match &request.mode {
        OutputMode::Structured(format) => (
            Some(serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": format.name,
                    "schema": format.schema,
                    "strict": true,
                }
            })),
            None,
        ),
        OutputMode::Conversational(defs) if !defs.is_empty() => (
            None,
            Some(
                defs.iter()
                    .map(|d| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": d.name,
                                "description": d.description,
                                "parameters": d.parameters,
                                "strict": d.strict,
                            }
                        })
                    })
                    .collect(),
            ),
        ),
        OutputMode::Conversational(_) | OutputMode::Text => (None, None),
    };

    ChatApiRequest {
        model: &request.model,
        messages,
        temperature: request.temperature,
        response_format,
        tools,
    }
}

/// Convert a parsed response into a turn. Tool calls without an id get a
/// positional one so every result can be correlated.
fn parse_turn(parsed: ChatApiResponse) -> Result<ModelTurn> {
    if let Some(error) = parsed.error {
        return Err(EvanaError::model(
            None,
            error.message.unwrap_or_else(|| "unknown provider error".into()),
        ));
    }

    let message = parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .ok_or_else(|| EvanaError::model(None, "no choices in response"))?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, tc)| ToolCallRequest {
            id: tc.id.filter(|id| !id.is_empty()).unwrap_or_else(|| format!("call_{i}")),
            name: tc.function.name,
            arguments: tc.function.arguments.unwrap_or_else(|| "{}".into()),
        })
        .collect();

    let usage = parsed.usage.map(|u| TokenUsage {
        prompt_tokens: u.prompt_tokens.unwrap_or(0),
        completion_tokens: u.completion_tokens.unwrap_or(0),
    });

    Ok(ModelTurn {
        content: message.content.unwrap_or_default(),
        tool_calls,
        usage,
    })
}

// ---------------------------------------------------------------------------
// ModelProvider impl
// ---------------------------------------------------------------------------

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    #[instrument(skip_all, fields(model = %request.model, mode = request.mode.label()))]
    async fn generate(&self, request: &ModelRequest) -> Result<ModelTurn> {
        let body = build_body(request);

        let response = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
                .ok()
                .and_then(|env| env.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| text.chars().take(MAX_ERROR_SNIPPET).collect());
            return Err(EvanaError::model(Some(status.as_u16()), message));
        }

        let parsed: ChatApiResponse = serde_json::from_str(&text)
            .map_err(|e| EvanaError::model(None, format!("invalid response JSON: {e}")))?;

        let turn = parse_turn(parsed)?;
        debug!(
            tool_calls = turn.tool_calls.len(),
            content_len = turn.content.len(),
            "model turn received"
        );
        Ok(turn)
    }
}
