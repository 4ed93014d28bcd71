//! Uniform tool invocation with failure containment.
//!
//! [`ToolAdapter::invoke`] never fails. Provider errors, timeouts and bad
//! arguments are logged and turned into a placeholder payload of the same
//! shape as a successful result, so the conversation can carry on.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, instrument, warn};

use evana_shared::{EvanaError, Result, RunContext};

use crate::crawl::{CrawlProvider, HttpCrawler};
use crate::email::{EmailProvider, EmailReceipt, LogEmailProvider};
use crate::kind::{CrawlArgs, EmailArgs, SearchArgs, ToolKind, count_arg, parse_args};
use crate::search::{ExaSearch, PageContent, SearchProvider};

/// Placeholder URL for a failed search.
pub const SEARCH_ERROR_URL: &str = "https://example.com/error";

/// Placeholder content for a failed search.
pub const SEARCH_ERROR_CONTENT: &str = "Error searching for vendors. Please try again later.";

/// Placeholder content for a failed crawl.
pub const CRAWL_ERROR_CONTENT: &str = "Error crawling venue website. Please try again later.";

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SEARCH_RESULTS: u32 = 5;
const DEFAULT_CRAWL_PAGES: u32 = 3;
const MAX_SEARCH_RESULTS: u32 = 25;
const MAX_CRAWL_PAGES: u32 = 10;

// ---------------------------------------------------------------------------
// ToolResult
// ---------------------------------------------------------------------------

/// JSON payload handed back to the model for one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// `None` when the requested name is not a known tool.
    pub tool: Option<ToolKind>,
    pub payload: String,
    /// True when `payload` is a placeholder standing in for a failure.
    pub degraded: bool,
}

impl ToolResult {
    fn success(kind: ToolKind, payload: String) -> Self {
        Self {
            tool: Some(kind),
            payload,
            degraded: false,
        }
    }

    /// Placeholder payload for a failed call of `kind`.
    pub fn degraded(kind: ToolKind, arguments: &str, reason: &str) -> Self {
        let payload = match kind {
            ToolKind::SearchVendors => json!([{
                "url": SEARCH_ERROR_URL,
                "content": SEARCH_ERROR_CONTENT,
            }]),
            ToolKind::CrawlVenueWebsite => json!([{
                "url": requested_url(arguments),
                "content": CRAWL_ERROR_CONTENT,
            }]),
            ToolKind::SendEmail => json!(EmailReceipt::failed(reason)),
        };
        Self {
            tool: Some(kind),
            payload: payload.to_string(),
            degraded: true,
        }
    }

    /// Payload for a name that matches no tool.
    pub fn unknown(name: &str) -> Self {
        Self {
            tool: None,
            payload: json!({ "error": format!("unknown tool '{name}'") }).to_string(),
            degraded: true,
        }
    }
}

/// Best-effort `url` argument, for the crawl placeholder.
fn requested_url(arguments: &str) -> String {
    serde_json::from_str::<serde_json::Value>(arguments)
        .ok()
        .and_then(|v| v.get("url").and_then(|u| u.as_str()).map(str::to_string))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// ToolAdapter
// ---------------------------------------------------------------------------

/// Dispatches tool calls to their providers.
#[derive(Clone)]
pub struct ToolAdapter {
    search: Arc<dyn SearchProvider>,
    crawl: Arc<dyn CrawlProvider>,
    email: Arc<dyn EmailProvider>,
    search_timeout: Duration,
    crawl_timeout: Duration,
    email_timeout: Duration,
    default_results: u32,
    default_max_pages: u32,
}

impl std::fmt::Debug for ToolAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolAdapter")
            .field("search_timeout", &self.search_timeout)
            .field("crawl_timeout", &self.crawl_timeout)
            .field("email_timeout", &self.email_timeout)
            .field("default_results", &self.default_results)
            .field("default_max_pages", &self.default_max_pages)
            .finish()
    }
}

impl ToolAdapter {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        crawl: Arc<dyn CrawlProvider>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            search,
            crawl,
            email,
            search_timeout: DEFAULT_TOOL_TIMEOUT,
            crawl_timeout: DEFAULT_TOOL_TIMEOUT,
            email_timeout: DEFAULT_TOOL_TIMEOUT,
            default_results: DEFAULT_SEARCH_RESULTS,
            default_max_pages: DEFAULT_CRAWL_PAGES,
        }
    }

    /// Wire the HTTP search, HTTP crawler and logging email providers.
    pub fn from_context(ctx: &RunContext) -> Result<Self> {
        let search = ExaSearch::new(&ctx.search)?;
        let crawl = HttpCrawler::new(&ctx.crawl)?;
        let email = LogEmailProvider::new(ctx.email_sender.clone());

        Ok(Self::new(Arc::new(search), Arc::new(crawl), Arc::new(email))
            .with_timeout(ToolKind::SearchVendors, ctx.search.timeout)
            .with_timeout(ToolKind::CrawlVenueWebsite, ctx.crawl.timeout)
            .with_defaults(ctx.search.default_results, ctx.crawl.default_max_pages))
    }

    /// Bound every call of `kind` by `timeout`.
    pub fn with_timeout(mut self, kind: ToolKind, timeout: Duration) -> Self {
        match kind {
            ToolKind::SearchVendors => self.search_timeout = timeout,
            ToolKind::CrawlVenueWebsite => self.crawl_timeout = timeout,
            ToolKind::SendEmail => self.email_timeout = timeout,
        }
        self
    }

    /// Defaults used when the model omits `totalResults` / `maxPages`.
    pub fn with_defaults(mut self, search_results: u32, crawl_pages: u32) -> Self {
        self.default_results = search_results;
        self.default_max_pages = crawl_pages;
        self
    }

    /// Invoke a tool by wire name.
    pub async fn invoke(&self, name: &str, arguments: &str) -> ToolResult {
        match ToolKind::from_name(name) {
            Some(kind) => self.invoke_kind(kind, arguments).await,
            None => {
                warn!(tool = name, "model requested unknown tool");
                ToolResult::unknown(name)
            }
        }
    }

    /// Invoke a known tool.
    #[instrument(skip(self, arguments), fields(tool = %kind))]
    pub async fn invoke_kind(&self, kind: ToolKind, arguments: &str) -> ToolResult {
        let started = Instant::now();
        let outcome = match kind {
            ToolKind::SearchVendors => self.run_search(arguments).await,
            ToolKind::CrawlVenueWebsite => self.run_crawl(arguments).await,
            ToolKind::SendEmail => self.run_email(arguments).await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(payload) => {
                debug!(elapsed_ms, "tool call succeeded");
                ToolResult::success(kind, payload)
            }
            Err(e) => {
                warn!(elapsed_ms, error = %e, "tool call failed, returning placeholder");
                ToolResult::degraded(kind, arguments, &e.to_string())
            }
        }
    }

    async fn run_search(&self, arguments: &str) -> Result<String> {
        let kind = ToolKind::SearchVendors;
        let args: SearchArgs = parse_args(kind, arguments)?;
        if args.query.trim().is_empty() {
            return Err(EvanaError::tool(kind.name(), "query must not be empty"));
        }
        let count = count_arg(args.total_results, self.default_results, MAX_SEARCH_RESULTS);

        let results = bounded(
            kind,
            self.search_timeout,
            self.search.search(args.query.trim(), count),
        )
        .await?;
        to_payload(kind, &results)
    }

    async fn run_crawl(&self, arguments: &str) -> Result<String> {
        let kind = ToolKind::CrawlVenueWebsite;
        let args: CrawlArgs = parse_args(kind, arguments)?;
        let max_pages = count_arg(args.max_pages, self.default_max_pages, MAX_CRAWL_PAGES);

        let pages: Vec<PageContent> = bounded(
            kind,
            self.crawl_timeout,
            self.crawl.crawl(args.url.trim(), max_pages),
        )
        .await?;
        to_payload(kind, &pages)
    }

    async fn run_email(&self, arguments: &str) -> Result<String> {
        let kind = ToolKind::SendEmail;
        let args: EmailArgs = parse_args(kind, arguments)?;
        let to: Vec<String> = args
            .to
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if to.is_empty() {
            return Err(EvanaError::tool(kind.name(), "no recipients given"));
        }

        let receipt = bounded(
            kind,
            self.email_timeout,
            self.email.send(&to, &args.subject, &args.body),
        )
        .await?;
        if !receipt.success {
            return Err(EvanaError::tool(kind.name(), receipt.message));
        }
        to_payload(kind, &receipt)
    }
}

/// Run a provider call under the tool's timeout.
async fn bounded<T>(
    kind: ToolKind,
    timeout: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| EvanaError::timeout(format!("{kind} call"), timeout))?
}

fn to_payload<T: serde::Serialize>(kind: ToolKind, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| EvanaError::tool(kind.name(), e.to_string()))
}
