//! Page content fetcher
//!
//! Best effort: [`ContentFetcher::fetch_content`] never fails. Network errors,
//! non-2xx responses and empty pages all produce placeholder text derived from
//! the domain so downstream prompts always have something to work with.

use std::time::Duration;
use tracing::{debug, warn};

use crate::providers::prompts::truncate_chars;
use crate::types::domain_of;

const USER_AGENT: &str = concat!("GeoTest/", env!("CARGO_PKG_VERSION"), " (+https://geotest.ai)");

/// Rendering width handed to html2text; lines are re-joined afterwards
const RENDER_WIDTH: usize = 120;

/// Bodies larger than this are not converted
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

pub struct ContentFetcher {
    http_client: reqwest::Client,
    timeout: Duration,
    max_chars: usize,
}

impl ContentFetcher {
    pub fn new(timeout: Duration, max_chars: usize) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "HTTP client builder failed, using default client");
                reqwest::Client::new()
            });

        Self::with_client(http_client, timeout, max_chars)
    }

    pub fn with_client(http_client: reqwest::Client, timeout: Duration, max_chars: usize) -> Self {
        Self {
            http_client,
            timeout,
            max_chars,
        }
    }

    /// Fetch `url` and return its readable text, at most `max_chars` characters
    pub async fn fetch_content(&self, url: &str) -> String {
        match self.try_fetch(url).await {
            Ok(text) if !text.is_empty() => {
                debug!(url, chars = text.chars().count(), "Fetched page content");
                text
            }
            Ok(_) => {
                warn!(url, "Page has no readable text, using fallback content");
                self.fallback(url)
            }
            Err(reason) => {
                warn!(url, reason = %reason, "Content fetch failed, using fallback content");
                self.fallback(url)
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<String, String> {
        let response = self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let body = response.text().await.map_err(|e| e.to_string())?;
        if body.len() > MAX_BODY_BYTES {
            return Err(format!("Body too large ({} bytes)", body.len()));
        }

        let text = if is_html {
            html_to_text(&body)
        } else {
            collapse_whitespace(&body)
        };

        Ok(truncate_chars(&text, self.max_chars))
    }

    fn fallback(&self, url: &str) -> String {
        truncate_chars(&fallback_content(url), self.max_chars)
    }
}

/// Convert an HTML document to single-spaced plain text
pub fn html_to_text(html: &str) -> String {
    collapse_whitespace(&html2text::from_read(html.as_bytes(), RENDER_WIDTH))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Placeholder text used when the page cannot be read
pub fn fallback_content(url: &str) -> String {
    let domain = domain_of(url);
    format!(
        "Website content for {domain} could not be retrieved. \
         Assess {domain} from its domain name, any public knowledge about the organisation behind it, \
         and typical content for sites of this kind."
    )
}
