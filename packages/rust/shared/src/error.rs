//! Error types for Evana.
//!
//! Library crates use [`EvanaError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::Stage;

/// Top-level error type for all Evana operations.
#[derive(Debug, thiserror::Error)]
pub enum EvanaError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP transport error talking to a model or tool provider.
    #[error("network error: {0}")]
    Network(String),

    /// The model provider rejected the request or returned an unusable response.
    #[error("model error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Model {
        status: Option<u16>,
        message: String,
    },

    /// Model output did not parse or did not match the expected schema.
    #[error("malformed output for {schema}: {message}")]
    MalformedOutput { schema: String, message: String },

    /// A tool provider failed. Recovered inside the tool adapter, never surfaced
    /// from a pipeline run.
    #[error("tool '{tool}' failed: {message}")]
    ToolAdapter { tool: String, message: String },

    /// The tool-call loop hit its iteration guard.
    #[error("tool-call loop exceeded {max_iterations} iterations")]
    ToolLoopExceeded { max_iterations: u32 },

    /// A model call, tool call, or the whole run exceeded its allotted time.
    #[error("{operation} timed out after {timeout:?}")]
    UpstreamTimeout { operation: String, timeout: Duration },

    /// A hard-dependency stage failed; the run cannot continue.
    #[error("pipeline aborted at stage {stage}: {source}")]
    PipelineAbort {
        stage: Stage,
        #[source]
        source: Box<EvanaError>,
    },

    /// Input validation error (empty request, bad arguments, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EvanaError>;

impl EvanaError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a malformed-output error for the named schema.
    pub fn malformed(schema: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MalformedOutput {
            schema: schema.into(),
            message: msg.into(),
        }
    }

    /// Create a model error with an optional HTTP status.
    pub fn model(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Model {
            status,
            message: msg.into(),
        }
    }

    /// Create a tool adapter error.
    pub fn tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ToolAdapter {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::UpstreamTimeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Wrap an error as the abort cause of `stage`.
    pub fn abort(stage: Stage, source: EvanaError) -> Self {
        Self::PipelineAbort {
            stage,
            source: Box::new(source),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry of the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::UpstreamTimeout { .. } => true,
            Self::Model {
                status: Some(status),
                ..
            } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// The stage named by a [`EvanaError::PipelineAbort`], if any.
    pub fn aborted_stage(&self) -> Option<Stage> {
        match self {
            Self::PipelineAbort { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = EvanaError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = EvanaError::model(Some(503), "overloaded");
        assert_eq!(err.to_string(), "model error (HTTP 503): overloaded");

        let err = EvanaError::model(None, "no choices");
        assert_eq!(err.to_string(), "model error: no choices");
    }

    #[test]
    fn abort_names_stage_and_cause() {
        let err = EvanaError::abort(
            Stage::GatherEventRequirements,
            EvanaError::malformed("EventRequirements", "missing field `mustHaveElements`"),
        );
        let text = err.to_string();
        assert!(text.contains("gather_event_requirements"));
        assert!(text.contains("mustHaveElements"));
        assert_eq!(err.aborted_stage(), Some(Stage::GatherEventRequirements));
    }

    #[test]
    fn transient_classification() {
        assert!(EvanaError::Network("reset".into()).is_transient());
        assert!(EvanaError::timeout("model call", Duration::from_secs(1)).is_transient());
        assert!(EvanaError::model(Some(429), "slow down").is_transient());
        assert!(EvanaError::model(Some(502), "bad gateway").is_transient());
        assert!(!EvanaError::model(Some(400), "bad request").is_transient());
        assert!(!EvanaError::malformed("EventAgenda", "eof").is_transient());
    }
}
