//! Conversation messages exchanged with the model.

use serde::Serialize;

use evana_shared::{EvanaError, Result};

/// A model-issued request to invoke a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallRequest {
    /// Correlation id; the matching tool result must carry it back.
    pub id: String,
    /// Wire name of the requested tool.
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User { content } | Self::Assistant { content, .. } | Self::Tool { content, .. } => {
                content
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Ordered message history for one tool-call loop.
///
/// Grows monotonically. A tool result can only be appended for a tool call
/// issued by the most recent assistant message that has not been answered yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
    /// Call ids of the latest assistant turn still awaiting a result.
    pending: Vec<String>,
}

impl Conversation {
    /// Start a conversation with a single user message.
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(user_message)],
            pending: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Tool call ids still awaiting a result.
    pub fn pending_calls(&self) -> &[String] {
        &self.pending
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) -> Result<()> {
        self.ensure_no_pending("user message")?;
        self.messages.push(Message::user(content));
        Ok(())
    }

    /// Append an assistant turn, opening its tool calls.
    pub fn push_assistant(
        &mut self,
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Result<()> {
        self.ensure_no_pending("assistant message")?;
        self.pending = tool_calls.iter().map(|c| c.id.clone()).collect();
        self.messages.push(Message::Assistant {
            content: content.into(),
            tool_calls,
        });
        Ok(())
    }

    /// Append the result of an outstanding tool call.
    pub fn push_tool_result(
        &mut self,
        call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<()> {
        let call_id = call_id.into();
        let Some(pos) = self.pending.iter().position(|id| *id == call_id) else {
            return Err(EvanaError::validation(format!(
                "tool result for unknown or already answered call id '{call_id}'"
            )));
        };
        self.pending.remove(pos);
        self.messages.push(Message::Tool {
            call_id,
            content: content.into(),
        });
        Ok(())
    }

    fn ensure_no_pending(&self, what: &str) -> Result<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(EvanaError::validation(format!(
                "cannot append {what} while tool calls [{}] await results",
                self.pending.join(", ")
            )))
        }
    }
}
