//! Core pipeline orchestration for Evana.
//!
//! This crate ties the generation client and the tool adapter together into
//! the seven-stage planning pipeline ([`Pipeline`], [`run_pipeline`]) and the
//! reusable tool-call loop it is built on ([`ToolLoop`]).

pub mod pipeline;
mod stages;
pub mod tool_loop;

#[cfg(test)]
mod test_support;

pub use pipeline::{Pipeline, ProgressReporter, SilentProgress, run_pipeline};
pub use tool_loop::{LoopTranscript, SummarizedRun, ToolExecution, ToolLoop, ToolLoopOutcome};
