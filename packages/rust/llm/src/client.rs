//! Generation client: one entry point per output mode.
//!
//! Wraps a [`ModelProvider`] with the model name, a per-call timeout and a
//! bounded retry for transient failures. Structured calls are validated
//! against their schema before they are returned.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use evana_schema::StructuredOutput;
use evana_shared::{EvanaError, ModelSettings, Result};

use crate::message::Message;
use crate::openai::OpenAiProvider;
use crate::provider::{ModelProvider, ModelRequest, ModelTurn, OutputMode, ToolDefinition};

/// Default per-call timeout.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// First retry delay; doubles on each further attempt.
const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// Model calls in structured, conversational or text mode.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn ModelProvider>,
    model: String,
    temperature: Option<f32>,
    call_timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("call_timeout", &self.call_timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl GenerationClient {
    /// Create a client with default timeout and no retries.
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: 0,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Build an HTTP-backed client from resolved settings.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        let provider = OpenAiProvider::new(settings)?;
        Ok(Self::new(Arc::new(provider), settings.model.clone())
            .with_timeout(settings.request_timeout)
            .with_retries(settings.max_retries)
            .with_temperature(settings.temperature))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Ask for JSON matching `T`'s schema and validate it.
    #[instrument(skip_all, fields(schema = T::SCHEMA_NAME))]
    pub async fn generate_structured<T: StructuredOutput>(
        &self,
        instructions: &str,
        messages: &[Message],
    ) -> Result<T> {
        let mode = OutputMode::Structured(T::descriptor().into());
        let turn = self.call(instructions, messages, mode).await?;

        // Some providers answer a schema-constrained request through a
        // function call instead of the content field.
        let raw = if turn.content.trim().is_empty() {
            match turn.tool_calls.first() {
                Some(call) => call.arguments.clone(),
                None => {
                    return Err(EvanaError::malformed(
                        T::SCHEMA_NAME,
                        "model returned empty content",
                    ));
                }
            }
        } else {
            turn.content
        };

        evana_schema::validate::<T>(&raw)
    }

    /// One conversational turn with the given tools available.
    #[instrument(skip_all, fields(tools = tools.len()))]
    pub async fn generate_conversational(
        &self,
        instructions: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn> {
        self.call(
            instructions,
            messages,
            OutputMode::Conversational(tools.to_vec()),
        )
        .await
    }

    /// Free text with no tools.
    #[instrument(skip_all)]
    pub async fn generate_text(&self, instructions: &str, messages: &[Message]) -> Result<String> {
        let turn = self.call(instructions, messages, OutputMode::Text).await?;
        let text = turn.content.trim();
        if text.is_empty() {
            return Err(EvanaError::model(None, "model returned empty text"));
        }
        Ok(text.to_string())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn call(
        &self,
        instructions: &str,
        messages: &[Message],
        mode: OutputMode,
    ) -> Result<ModelTurn> {
        let request = ModelRequest {
            model: self.model.clone(),
            instructions: instructions.to_string(),
            messages: messages.to_vec(),
            mode,
            temperature: self.temperature,
        };

        let mut attempt = 0u32;
        loop {
            match self.attempt(&request).await {
                Ok(turn) => {
                    if let Some(usage) = turn.usage {
                        debug!(
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            "model usage"
                        );
                    }
                    return Ok(turn);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        ?delay,
                        "transient model failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, request: &ModelRequest) -> Result<ModelTurn> {
        tokio::time::timeout(self.call_timeout, self.provider.generate(request))
            .await
            .map_err(|_| EvanaError::timeout("model call", self.call_timeout))?
    }
}
