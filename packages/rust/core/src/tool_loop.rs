//! Tool-call loop controller.
//!
//! Runs `model → tool calls → tool results → model` until the model answers
//! without requesting tools, or the iteration guard trips. Tool calls from one
//! model turn are dispatched concurrently and their results appended in the
//! order the model issued them.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use evana_llm::{Conversation, GenerationClient, ToolCallRequest};
use evana_shared::{EvanaError, Result};
use evana_tools::{ToolAdapter, ToolKind, ToolResult, definitions};

/// One executed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecution {
    pub call_id: String,
    /// `None` for a name that matches no tool.
    pub tool: Option<ToolKind>,
    pub payload: String,
    pub degraded: bool,
}

/// Everything a loop run produced, complete or not.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopTranscript {
    pub conversation: Conversation,
    pub executions: Vec<ToolExecution>,
    /// Model calls made.
    pub iterations: u32,
}

impl LoopTranscript {
    /// Executions of `kind` that succeeded.
    pub fn successful(&self, kind: ToolKind) -> impl Iterator<Item = &ToolExecution> {
        self.executions
            .iter()
            .filter(move |e| e.tool == Some(kind) && !e.degraded)
    }

    /// Whether `kind` was called at all.
    pub fn called(&self, kind: ToolKind) -> bool {
        self.executions.iter().any(|e| e.tool == Some(kind))
    }
}

/// How a loop run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolLoopOutcome {
    /// The model answered without requesting further tools.
    Completed {
        transcript: LoopTranscript,
        answer: String,
    },
    /// The iteration guard tripped while the model still wanted tools.
    Exceeded {
        transcript: LoopTranscript,
        max_iterations: u32,
    },
}

impl ToolLoopOutcome {
    pub fn transcript(&self) -> &LoopTranscript {
        match self {
            Self::Completed { transcript, .. } | Self::Exceeded { transcript, .. } => transcript,
        }
    }

    pub fn into_transcript(self) -> LoopTranscript {
        match self {
            Self::Completed { transcript, .. } | Self::Exceeded { transcript, .. } => transcript,
        }
    }

    pub fn is_exceeded(&self) -> bool {
        matches!(self, Self::Exceeded { .. })
    }

    /// The final answer, or [`EvanaError::ToolLoopExceeded`].
    pub fn into_answer(self) -> Result<String> {
        match self {
            Self::Completed { answer, .. } => Ok(answer),
            Self::Exceeded { max_iterations, .. } => {
                Err(EvanaError::ToolLoopExceeded { max_iterations })
            }
        }
    }
}

/// The result of [`ToolLoop::run_and_summarize`].
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizedRun {
    pub summary: String,
    pub transcript: LoopTranscript,
    /// True when the summary was written from a partial conversation.
    pub partial: bool,
}

// ---------------------------------------------------------------------------
// ToolLoop
// ---------------------------------------------------------------------------

/// A tool-call loop over a fixed toolset.
#[derive(Debug, Clone, Copy)]
pub struct ToolLoop<'a> {
    client: &'a GenerationClient,
    tools: &'a ToolAdapter,
    toolset: &'a [ToolKind],
    max_iterations: u32,
    concurrency: usize,
}

impl<'a> ToolLoop<'a> {
    pub fn new(
        client: &'a GenerationClient,
        tools: &'a ToolAdapter,
        toolset: &'a [ToolKind],
    ) -> Self {
        Self {
            client,
            tools,
            toolset,
            max_iterations: 5,
            concurrency: 4,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run the loop from a single user message.
    ///
    /// Model failures propagate. Tool failures never do: they come back as
    /// degraded payloads inside the conversation.
    #[instrument(skip_all, fields(tools = ?self.toolset, max_iterations = self.max_iterations))]
    pub async fn run(&self, instructions: &str, user_message: &str) -> Result<ToolLoopOutcome> {
        let definitions = definitions(self.toolset);
        let mut conversation = Conversation::new(user_message);
        let mut executions = Vec::new();

        for iteration in 1..=self.max_iterations {
            let turn = self
                .client
                .generate_conversational(instructions, conversation.messages(), &definitions)
                .await?;

            if turn.is_final() {
                debug!(iteration, "model produced final answer");
                conversation.push_assistant(turn.content.clone(), Vec::new())?;
                return Ok(ToolLoopOutcome::Completed {
                    transcript: LoopTranscript {
                        conversation,
                        executions,
                        iterations: iteration,
                    },
                    answer: turn.content,
                });
            }

            let calls = turn.tool_calls;
            info!(iteration, calls = calls.len(), "executing tool calls");
            conversation.push_assistant(turn.content, calls.clone())?;

            // `buffered` yields in input order, whatever the completion order.
            let results: Vec<ToolResult> = stream::iter(calls.iter().map(|call| self.execute(call)))
                .buffered(self.concurrency)
                .collect()
                .await;

            for (call, result) in calls.iter().zip(results) {
                conversation.push_tool_result(call.id.clone(), result.payload.clone())?;
                executions.push(ToolExecution {
                    call_id: call.id.clone(),
                    tool: result.tool,
                    payload: result.payload,
                    degraded: result.degraded,
                });
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "tool-call loop hit its iteration guard"
        );
        Ok(ToolLoopOutcome::Exceeded {
            transcript: LoopTranscript {
                conversation,
                executions,
                iterations: self.max_iterations,
            },
            max_iterations: self.max_iterations,
        })
    }

    /// Run the loop, then ask the model for a tool-free summary of the whole
    /// conversation. A loop that hit its guard is still summarized.
    pub async fn run_and_summarize(
        &self,
        instructions: &str,
        user_message: &str,
        summary_instructions: &str,
    ) -> Result<SummarizedRun> {
        let outcome = self.run(instructions, user_message).await?;
        let partial = outcome.is_exceeded();
        let transcript = outcome.into_transcript();

        let summary = self
            .client
            .generate_text(summary_instructions, transcript.conversation.messages())
            .await?;

        Ok(SummarizedRun {
            summary,
            transcript,
            partial,
        })
    }

    async fn execute(&self, call: &ToolCallRequest) -> ToolResult {
        match ToolKind::from_name(&call.name) {
            Some(kind) if self.toolset.contains(&kind) => {
                self.tools.invoke_kind(kind, &call.arguments).await
            }
            Some(kind) => {
                warn!(tool = %kind, "model requested a tool outside this stage's toolset");
                ToolResult::degraded(kind, &call.arguments, "tool not available at this stage")
            }
            None => self.tools.invoke(&call.name, &call.arguments).await,
        }
    }
}
