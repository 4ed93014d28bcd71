//! Generation client and model-provider plumbing.
//!
//! This crate provides:
//! - [`message`]: the typed conversation model (user / assistant / tool result)
//! - [`provider`]: the [`ModelProvider`] trait and request/response types
//! - [`openai`]: an OpenAI-compatible chat completions provider
//! - [`client`]: [`GenerationClient`], the structured / conversational / text
//!   front door with timeout and retry policy

pub mod client;
pub mod message;
pub mod openai;
pub mod provider;

pub use client::GenerationClient;
pub use message::{Conversation, Message, ToolCallRequest};
pub use openai::OpenAiProvider;
pub use provider::{
    JsonSchemaFormat, ModelProvider, ModelRequest, ModelTurn, OutputMode, TokenUsage,
    ToolDefinition,
};
