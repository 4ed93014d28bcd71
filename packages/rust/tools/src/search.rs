//! Web search provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use evana_shared::{EvanaError, Result, SearchSettings};

/// User-Agent string for tool requests.
pub(crate) const USER_AGENT: &str = concat!("Evana/", env!("CARGO_PKG_VERSION"));

/// Characters of page text kept per search hit.
const MAX_RESULT_CHARS: usize = 2_000;

/// One page of text returned by search or crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub content: String,
}

/// Search backend used by the `search_vendors` tool.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, count: u32) -> Result<Vec<PageContent>>;
}

// ---------------------------------------------------------------------------
// Exa-compatible HTTP search
// ---------------------------------------------------------------------------

/// Client for an Exa-compatible `POST /search` endpoint.
#[derive(Debug, Clone)]
pub struct ExaSearch {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    num_results: u32,
    contents: SearchContents,
}

#[derive(Serialize)]
struct SearchContents {
    text: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl ExaSearch {
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EvanaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl SearchProvider for ExaSearch {
    #[instrument(skip(self), fields(provider = "exa"))]
    async fn search(&self, query: &str, count: u32) -> Result<Vec<PageContent>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EvanaError::tool("search_vendors", "search API key not configured"))?;

        let body = SearchRequest {
            query,
            num_results: count,
            contents: SearchContents { text: true },
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EvanaError::Network(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EvanaError::tool(
                "search_vendors",
                format!("search provider returned HTTP {status}"),
            ));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| EvanaError::tool("search_vendors", format!("invalid response: {e}")))?;

        let results: Vec<PageContent> = parsed
            .results
            .into_iter()
            .take(count as usize)
            .map(|hit| {
                let content = hit
                    .text
                    .filter(|t| !t.trim().is_empty())
                    .or(hit.title)
                    .unwrap_or_default();
                PageContent {
                    url: hit.url,
                    content: truncate_chars(content.trim(), MAX_RESULT_CHARS),
                }
            })
            .collect();

        debug!(results = results.len(), "search complete");
        Ok(results)
    }
}

/// Truncate to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
