//! Model provider trait and request/response types.

use async_trait::async_trait;
use serde::Serialize;

use evana_schema::SchemaDescriptor;
use evana_shared::Result;

use crate::message::{Message, ToolCallRequest};

/// A tool the model may call, with its JSON Schema parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    /// Ask the provider to enforce `parameters` exactly.
    pub strict: bool,
}

/// Strict JSON Schema response format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub schema: serde_json::Value,
}

impl From<SchemaDescriptor> for JsonSchemaFormat {
    fn from(d: SchemaDescriptor) -> Self {
        Self {
            name: d.name.to_string(),
            schema: d.schema,
        }
    }
}

/// How the model should answer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMode {
    /// Must return JSON matching the schema.
    Structured(JsonSchemaFormat),
    /// May request any of the tools, or answer in text.
    Conversational(Vec<ToolDefinition>),
    /// Free text, no tools.
    Text,
}

impl OutputMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Structured(_) => "structured",
            Self::Conversational(_) => "conversational",
            Self::Text => "text",
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    /// System instructions, sent ahead of the messages.
    pub instructions: String,
    pub messages: Vec<Message>,
    pub mode: OutputMode,
    pub temperature: Option<f32>,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One assistant turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub content: String,
    /// Empty when the model produced a final answer.
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<TokenUsage>,
}

impl ModelTurn {
    /// A final text answer with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// A turn requesting the given tool calls.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: calls,
            ..Default::default()
        }
    }

    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// A backend that can answer [`ModelRequest`]s.
///
/// All providers must be `Send + Sync` so independent pipeline runs can
/// share one provider.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: &ModelRequest) -> Result<ModelTurn>;
}
