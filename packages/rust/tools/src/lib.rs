//! Tools the model can call during a planning run.
//!
//! This crate provides:
//! - [`ToolKind`]: the closed set of tools and their declarations
//! - [`ToolAdapter`]: dispatch with failure containment
//! - Provider traits with an Exa-compatible search client, an in-process
//!   HTTP crawler and a logging email stub

pub mod adapter;
pub mod crawl;
pub mod email;
pub mod kind;
pub mod search;

pub use adapter::{
    CRAWL_ERROR_CONTENT, SEARCH_ERROR_CONTENT, SEARCH_ERROR_URL, ToolAdapter, ToolResult,
};
pub use crawl::{CrawlProvider, HttpCrawler};
pub use email::{EmailProvider, EmailReceipt, LogEmailProvider};
pub use kind::{ToolKind, definitions};
pub use search::{ExaSearch, PageContent, SearchProvider};
