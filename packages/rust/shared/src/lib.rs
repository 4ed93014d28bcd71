//! Shared types, error model, and configuration for Evana.
//!
//! This crate is the foundation depended on by all other Evana crates.
//! It provides:
//! - [`EvanaError`]: the unified error type
//! - Domain types ([`EventRequirements`], [`EventAgenda`], [`TimelineChecklist`],
//!   [`EmailOutcome`], [`AggregateResult`], [`Stage`], [`RunId`])
//! - Configuration ([`AppConfig`], config loading) and the per-run [`RunContext`]

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlSettings, EmailConfig, ModelConfig, ModelSettings,
    PipelineConfig, PipelineLimits, RunContext, SearchConfig, SearchSettings, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{EvanaError, Result};
pub use types::{
    AgendaItem, AggregateResult, ChecklistItem, ChecklistStatus, EMAIL_NOT_SENT_MESSAGE,
    EmailOutcome, EventAgenda, EventPreferences, EventRequirements, RunId, Stage,
    TimelineChecklist,
};
