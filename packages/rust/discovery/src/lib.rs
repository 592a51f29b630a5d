//! Scope-restricted link discovery for documentation sites.
//!
//! Starting from the configured base path, the discoverer fetches each page,
//! collects anchor targets that fall under the base-path prefix, and appends
//! unseen ones to an ordered work list. Processing is index-driven over that
//! monotonically growing list, so traversal terminates on any finite site
//! graph and the result order equals first-seen order. The same order later
//! becomes the chunk generation order, so it is semantically meaningful.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use docqa_shared::{DocqaError, Result};

/// User-Agent string for discovery requests.
const USER_AGENT: &str = concat!("docqa/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow per fetch.
const MAX_REDIRECTS: usize = 5;

/// Options for the discovery process.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Timeout for each page fetch in seconds.
    pub timeout_secs: u64,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Crawls pages restricted to a URL prefix and returns deduplicated,
/// first-seen-ordered links.
pub struct LinkDiscoverer {
    client: Client,
    /// Site base URL with no trailing slash, used for fetches and for
    /// stripping absolute links down to site-relative paths.
    site_root: String,
    base_path: String,
}

impl LinkDiscoverer {
    /// Create a discoverer for the given site and base-path prefix.
    pub fn new(base_url: &Url, base_path: impl Into<String>, opts: &DiscoveryOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| DocqaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            site_root: base_url.as_str().trim_end_matches('/').to_string(),
            base_path: base_path.into(),
        })
    }

    /// Discover all in-prefix links reachable from the base path itself.
    pub async fn discover(&self) -> Result<Vec<String>> {
        let start = self.base_path.clone();
        self.discover_from(&start).await
    }

    /// Discover all in-prefix links reachable from `start`.
    ///
    /// Any fetch error aborts discovery and propagates; no partial result
    /// is surfaced.
    #[instrument(skip(self), fields(site = %self.site_root, prefix = %self.base_path))]
    pub async fn discover_from(&self, start: &str) -> Result<Vec<String>> {
        let mut links: Vec<String> = vec![start.to_string()];
        let mut seen: HashSet<String> = links.iter().cloned().collect();
        let mut cursor = 0;

        while cursor < links.len() {
            let url = format!("{}{}", self.site_root, links[cursor]);
            debug!(%url, cursor, frontier = links.len(), "fetching page");

            let body = self.fetch(&url).await?;

            for href in page_anchor_targets(&body) {
                if let Some(link) = self.normalize(&href) {
                    if seen.insert(link.clone()) {
                        links.push(link);
                    }
                }
            }

            cursor += 1;
        }

        info!(count = links.len(), "discovery complete");
        Ok(links)
    }

    /// Normalize an anchor target to a site-relative in-prefix link, or
    /// `None` when it is out of scope.
    fn normalize(&self, href: &str) -> Option<String> {
        let mut link = href;
        if let Some(stripped) = link.strip_prefix(&self.site_root) {
            link = stripped;
        }
        // Drop the fragment identifier; anchors within a page are the same page.
        let link = link.split('#').next().unwrap_or("");

        if link.starts_with(&self.base_path) {
            Some(link.to_string())
        } else {
            None
        }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DocqaError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocqaError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| DocqaError::Network(format!("{url}: body read failed: {e}")))
    }
}

/// Extract raw anchor `href` targets from an HTML document.
fn page_anchor_targets(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a[href]").expect("valid selector");

    doc.select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .collect()
}
