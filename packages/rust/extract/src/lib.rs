//! Page text extraction.
//!
//! Fetches an HTML page, locates the primary content container via a
//! configurable CSS selector (default: the Docusaurus content container),
//! and converts it to plain Markdown-flavored text using the `htmd` crate.
//! When the selector matches nothing the whole document is converted
//! instead, so a missing container degrades rather than failing the page.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

use docqa_shared::{DocqaError, Result};

/// User-Agent string for extraction requests.
const USER_AGENT: &str = concat!("docqa/", env!("CARGO_PKG_VERSION"));

/// Known mojibake sequences produced by UTF-8 text mis-decoded as Latin-1,
/// mapped back to the characters they stand for.
const MOJIBAKE: &[(&str, &str)] = &[
    ("\u{e2}\u{20ac}\u{2122}", "'"),  // â€™ (right single quote)
    ("\u{e2}\u{20ac}\u{153}", "\""),  // â€œ (left double quote)
    ("\u{e2}\u{20ac}\u{9d}", "\""),   // right double quote
    ("\u{e2}\u{20ac}\u{201c}", "-"),  // en dash
    ("\u{e2}\u{20ac}\u{201d}", "-"),  // em dash
    ("\u{e2}\u{20ac}\u{a6}", "..."),  // â€¦ (ellipsis)
    ("\u{c2}\u{a0}", " "),            // Â + nbsp
    ("\u{c2} ", " "),                 // Â + space
];

/// Options for text extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// CSS selector locating the primary content container.
    pub content_selector: String,
    /// Timeout for each page fetch in seconds.
    pub timeout_secs: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            content_selector: "div.theme-doc-markdown".into(),
            timeout_secs: 30,
        }
    }
}

/// Fetches pages and converts their main content region to plain text.
pub struct TextExtractor {
    client: Client,
    opts: ExtractOptions,
}

impl TextExtractor {
    /// Create an extractor with the given options.
    pub fn new(opts: ExtractOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| DocqaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, opts })
    }

    /// Fetch a page and extract its content as plain text.
    #[instrument(skip(self))]
    pub async fn extract(&self, url: &str) -> Result<String> {
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

        let body = response
            .text()
            .await
            .map_err(|e| DocqaError::Network(format!("{url}: body read failed: {e}")))?;

        self.extract_from_html(&body)
    }

    /// Extract plain text from an already-fetched HTML document.
    pub fn extract_from_html(&self, html: &str) -> Result<String> {
        let content_html = {
            let doc = Html::parse_document(html);
            match Selector::parse(&self.opts.content_selector) {
                Ok(sel) => doc.select(&sel).next().map(|el| el.html()),
                Err(e) => {
                    warn!(selector = %self.opts.content_selector, error = %e, "invalid content selector");
                    None
                }
            }
        };

        let source = match content_html {
            Some(inner) => inner,
            None => {
                // Selector miss degrades to converting the whole document.
                debug!(selector = %self.opts.content_selector, "content container not found, converting whole document");
                html.to_string()
            }
        };

        let text = html_to_text(&source)?;
        Ok(trim_blank_lines(&strip_mojibake(&text)))
    }
}

/// Convert HTML to Markdown-flavored plain text via `htmd`.
fn html_to_text(html: &str) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();

    converter
        .convert(html)
        .map_err(|e| DocqaError::parse(format!("html conversion failed: {e}")))
}

/// Replace known mis-decoded byte sequences with their intended characters.
fn strip_mojibake(text: &str) -> String {
    let mut result = text.to_string();
    for (bad, good) in MOJIBAKE {
        if result.contains(bad) {
            result = result.replace(bad, good);
        }
    }
    result
}

/// Strip leading and trailing blank lines.
fn trim_blank_lines(text: &str) -> String {
    static EDGE_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\A(?:[ \t]*\n)+|(?:\n[ \t]*)+\z").expect("valid regex"));

    EDGE_BLANK_RE.replace_all(text, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn extractor() -> TextExtractor {
        TextExtractor::new(ExtractOptions::default()).unwrap()
    }

    #[test]
    fn extracts_content_container_only() {
        let html = r#"<html><body>
            <nav><a href="/">home</a></nav>
            <div class="theme-doc-markdown">
                <h1>Install</h1>
                <p>Run the installer.</p>
            </div>
            <footer>copyright</footer>
        </body></html>"#;

        let text = extractor().extract_from_html(html).unwrap();
        assert!(text.contains("# Install"));
        assert!(text.contains("Run the installer."));
        assert!(!text.contains("copyright"));
    }

    #[test]
    fn falls_back_to_whole_document() {
        let html = r#"<html><body>
            <main><h1>Standalone</h1><p>No theme container here.</p></main>
        </body></html>"#;

        let text = extractor().extract_from_html(html).unwrap();
        assert!(text.contains("# Standalone"));
        assert!(text.contains("No theme container here."));
    }

    #[test]
    fn strips_mojibake_sequences() {
        let text = "It\u{e2}\u{20ac}\u{2122}s here\u{c2} now";
        assert_eq!(strip_mojibake(text), "It's here now");
    }

    #[test]
    fn trims_edge_blank_lines() {
        let text = "\n  \n# Title\n\nbody\n\n   \n";
        assert_eq!(trim_blank_lines(text), "# Title\n\nbody");
    }

    #[tokio::test]
    async fn fetch_and_extract() {
        let server = MockServer::start().await;

        let html = r#"<html><body>
            <div class="theme-doc-markdown"><h1>Page</h1><p>content</p></div>
        </body></html>"#;

        Mock::given(method("GET"))
            .and(path("/docs/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let text = extractor()
            .extract(&format!("{}/docs/page", server.uri()))
            .await
            .unwrap();
        assert!(text.contains("# Page"));
    }

    #[tokio::test]
    async fn fetch_error_propagates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/docs/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = extractor()
            .extract(&format!("{}/docs/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, DocqaError::Network(_)));
    }
}
