//! Venue website crawler.
//!
//! Fetches a start page and follows same-host links breadth-first until
//! `max_pages` pages have been read. Each page's main content is converted to
//! Markdown and truncated.

use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use evana_shared::{CrawlSettings, EvanaError, Result};

use crate::search::{PageContent, USER_AGENT, truncate_chars};

/// Crawl backend used by the `crawl_venue_website` tool.
#[async_trait]
pub trait CrawlProvider: Send + Sync {
    async fn crawl(&self, url: &str, max_pages: u32) -> Result<Vec<PageContent>>;
}

// ---------------------------------------------------------------------------
// HttpCrawler
// ---------------------------------------------------------------------------

/// In-process HTTP crawler.
pub struct HttpCrawler {
    client: Client,
    max_content_chars: usize,
    /// Allow localhost/private IPs (for tests against mock servers).
    allow_private_hosts: bool,
}

impl HttpCrawler {
    pub fn new(settings: &CrawlSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EvanaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_content_chars: settings.max_content_chars,
            allow_private_hosts: settings.allow_private_hosts,
        })
    }

    fn blocked(&self, url: &Url) -> bool {
        !self.allow_private_hosts && is_ssrf_target(url)
    }
}

#[async_trait]
impl CrawlProvider for HttpCrawler {
    #[instrument(skip(self), fields(provider = "http"))]
    async fn crawl(&self, url: &str, max_pages: u32) -> Result<Vec<PageContent>> {
        let start = Url::parse(url.trim())
            .map_err(|e| EvanaError::tool("crawl_venue_website", format!("invalid URL '{url}': {e}")))?;

        if self.blocked(&start) {
            return Err(EvanaError::tool(
                "crawl_venue_website",
                format!("refusing to crawl private or non-HTTP address {start}"),
            ));
        }

        let host = start.host_str().unwrap_or("").to_string();
        let limit = max_pages.max(1) as usize;

        let mut queue = VecDeque::from([start.clone()]);
        let mut visited = HashSet::new();
        let mut pages = Vec::new();

        while let Some(next) = queue.pop_front() {
            if pages.len() >= limit {
                break;
            }
            if !visited.insert(normalize_url(&next)) {
                continue;
            }

            match fetch_page(&self.client, &next).await {
                Ok((html, links)) => {
                    pages.push(PageContent {
                        url: next.to_string(),
                        content: truncate_chars(&html_to_markdown(&html), self.max_content_chars),
                    });

                    for link in links {
                        if link.host_str() == Some(host.as_str()) && !self.blocked(&link) {
                            queue.push_back(link);
                        }
                    }
                }
                // The start page is the one the model asked for.
                Err(e) if next == start => return Err(e),
                Err(e) => {
                    warn!(url = %next, error = %e, "skipping page");
                }
            }
        }

        info!(pages = pages.len(), "crawl completed");
        Ok(pages)
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// Fetch one page, returning its HTML and outgoing links.
async fn fetch_page(client: &Client, url: &Url) -> Result<(String, Vec<Url>)> {
    debug!(%url, "fetching page");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| EvanaError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EvanaError::tool(
            "crawl_venue_website",
            format!("{url}: HTTP {status}"),
        ));
    }

    let body = response
        .text()
        .await
        .map_err(|e| EvanaError::Network(format!("{url}: body read failed: {e}")))?;

    let links = extract_links(&Html::parse_document(&body), url);
    Ok((body, links))
}

/// Extract all links from a document, resolved against the base URL.
fn extract_links(doc: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(link_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    doc.select(&link_sel)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| {
            !(href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:"))
        })
        .filter_map(|href| base_url.join(href).ok())
        .map(|mut resolved| {
            resolved.set_fragment(None);
            resolved
        })
        .collect()
}

/// Normalize a URL for deduplication (strip fragment and trailing slash).
fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    if s.ends_with('/') && s.matches('/').count() > 3 {
        s.pop();
    }
    s
}

// ---------------------------------------------------------------------------
// Content extraction
// ---------------------------------------------------------------------------

/// Convert the main content of an HTML page to Markdown.
fn html_to_markdown(html: &str) -> String {
    let content = main_content_html(html);
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript", "svg",
        ])
        .build();

    match converter.convert(&content) {
        Ok(markdown) => collapse_blank_lines(&markdown),
        Err(e) => {
            warn!(error = %e, "markdown conversion failed, using plain text");
            Html::parse_fragment(&content)
                .root_element()
                .text()
                .collect::<Vec<_>>()
                .join(" ")
        }
    }
}

/// Pick `<main>`, `<article>` or `<body>` inner HTML, in that order.
fn main_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);
    for sel_str in ["main", "article", r#"[role="main"]"#, "body"] {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(el) = doc.select(&sel).next() {
            return el.inner_html();
        }
    }
    html.to_string()
}

fn collapse_blank_lines(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0;
    for line in markdown.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn crawler(allow_private_hosts: bool) -> HttpCrawler {
        HttpCrawler::new(&CrawlSettings {
            default_max_pages: 3,
            max_content_chars: 8_000,
            timeout: Duration::from_secs(5),
            allow_private_hosts,
        })
        .unwrap()
    }

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(body.to_string()),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn ssrf_protection_blocks_private_targets() {
        for blocked in [
            "file:///etc/passwd",
            "http://192.168.1.1/admin",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://localhost:3000/api",
            "http://[::1]/",
            "http://printer.local/",
        ] {
            let url = Url::parse(blocked).unwrap();
            assert!(is_ssrf_target(&url), "{blocked} should be blocked");
        }

        let url = Url::parse("https://thegrandhall.com/events").unwrap();
        assert!(!is_ssrf_target(&url));
    }

    #[test]
    fn extract_links_resolves_and_skips_anchors() {
        let html = r##"<html><body><a href="/menu">Menu</a><a href="https://external.com">External</a><a href="#top">Top</a><a href="mailto:a@b.c">Mail</a></body></html>"##;
        let base = Url::parse("https://venue.test/about").unwrap();
        let links: Vec<String> = extract_links(&Html::parse_document(html), &base)
            .into_iter()
            .map(|u| u.to_string())
            .collect();

        assert_eq!(links, vec!["https://venue.test/menu", "https://external.com/"]);
    }

    #[test]
    fn main_content_becomes_markdown() {
        let html = r#"<html><body>
            <nav>Home | About</nav>
            <main><h1>The Grand Hall</h1><p>Seats <strong>200</strong> guests.</p></main>
            <footer>Copyright</footer>
        </body></html>"#;
        let md = html_to_markdown(html);
        assert!(md.contains("# The Grand Hall"));
        assert!(md.contains("**200**"));
        assert!(!md.contains("Copyright"));
        assert!(!md.contains("Home | About"));
    }

    #[tokio::test]
    async fn crawl_follows_same_host_links_up_to_limit() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><main><h1>Venue</h1><a href="/pricing">Pricing</a><a href="/gallery">Gallery</a><a href="https://elsewhere.test/">Other</a></main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/pricing",
            r#"<html><body><main><p>Packages from $1500</p></main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/gallery",
            r#"<html><body><main><p>Photos</p></main></body></html>"#,
        )
        .await;

        let pages = crawler(true).crawl(&server.uri(), 2).await.unwrap();

        assert_eq!(pages.len(), 2);
        assert!(pages[0].content.contains("# Venue"));
        assert!(pages[1].url.ends_with("/pricing"));
        assert!(pages[1].content.contains("Packages from $1500"));
    }

    #[tokio::test]
    async fn broken_child_pages_are_skipped() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><main><a href="/missing">Gone</a><a href="/ok">Ok</a></main></body></html>"#,
        )
        .await;
        mount_page(&server, "/ok", "<html><body><p>Still here</p></body></html>").await;

        let pages = crawler(true).crawl(&server.uri(), 3).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[1].content.contains("Still here"));
    }

    #[tokio::test]
    async fn failing_start_page_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = crawler(true).crawl(&server.uri(), 3).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn private_hosts_blocked_by_default() {
        let server = MockServer::start().await;
        let err = crawler(false).crawl(&server.uri(), 1).await.unwrap_err();
        assert!(matches!(err, EvanaError::ToolAdapter { .. }));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn content_is_truncated() {
        let server = MockServer::start().await;
        let long = format!("<html><body><p>{}</p></body></html>", "a".repeat(500));
        mount_page(&server, "/", &long).await;

        let mut c = crawler(true);
        c.max_content_chars = 100;
        let pages = c.crawl(&server.uri(), 1).await.unwrap();
        assert_eq!(pages[0].content.chars().count(), 100);
    }
}
