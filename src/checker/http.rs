// src/checker/http.rs
// =============================================================================
// This module checks whether a single URL is alive.
//
// Key functionality:
// - Rejects non-http(s) URLs and skip-listed hosts without any request
// - Makes HTTP GET requests (some servers misreport HEAD)
// - Follows redirects itself, one hop at a time, up to a bound
// - Classifies terminal statuses and transport failures into LinkOutcome
// - Bounds the whole check (all hops) with one timeout
//
// The checker never returns an error: whatever happens ends up inside the
// ValidationRecord it hands back.
// =============================================================================

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use url::Url;

use super::record::{DiscoveredLink, LinkOutcome, ValidationRecord};
use crate::config::{AppConfig, SkipRule};

// Matches "1.2.3.4:80" and "[::1]:443" (with an optional leading "/")
static SOCKET_ADDR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*/?(?:\[[0-9A-Fa-f:.]+\]|\d{1,3}(?:\.\d{1,3}){3}):\d{1,5}:?")
        .expect("socket address pattern is valid")
});

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Settings for one checker instance.
#[derive(Debug, Clone)]
pub struct CheckSettings {
    /// Per-request timeout, also the budget for the whole redirect chain
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
    pub skip_rules: Vec<SkipRule>,
}

impl CheckSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout: config.timeout(),
            connect_timeout: config.connect_timeout(),
            max_redirects: config.max_redirects,
            user_agent: config.user_agent.clone(),
            skip_rules: config.skip_rules.clone(),
        }
    }
}

// Anything that can turn a discovered link into a record.
//
// The validator only talks to this trait, so tests can count or script
// checks without a network.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn check(&self, link: DiscoveredLink) -> ValidationRecord;
}

// Client configuration shared by every check: browser-like headers, bounded
// timeouts, and no automatic redirects (we follow them by hand).
pub fn client_builder(settings: &CheckSettings) -> ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));

    Client::builder()
        .user_agent(settings.user_agent.clone())
        .default_headers(headers)
        .timeout(settings.timeout)
        .connect_timeout(settings.connect_timeout)
        .redirect(reqwest::redirect::Policy::none())
}

/// HTTP implementation of [`LinkProbe`].
///
/// Holds one connection pool that all concurrent checks share.
pub struct HttpChecker {
    client: Client,
    settings: CheckSettings,
}

impl HttpChecker {
    pub fn new(settings: CheckSettings) -> Result<Self, reqwest::Error> {
        let client = client_builder(&settings).build()?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: Client, settings: CheckSettings) -> Self {
        Self { client, settings }
    }

    fn skip_rule_for(&self, url: &Url) -> Option<&SkipRule> {
        let host = url.host_str()?;
        self.settings.skip_rules.iter().find(|rule| rule.matches_host(host))
    }

    // Walks the redirect chain starting at `start`.
    //
    // Returns the outcome plus the URL the chain ended on, if it moved.
    async fn follow(&self, start: &Url) -> (LinkOutcome, Option<String>) {
        let mut current = start.clone();
        let mut depth = 0;

        loop {
            let response = match self.client.get(current.clone()).send().await {
                Ok(response) => response,
                Err(e) => return (categorize_error(&e), moved_to(start, &current)),
            };

            let status = response.status();
            if status.is_redirection() {
                if let Some(next) = redirect_target(&current, &response) {
                    depth += 1;
                    if depth > self.settings.max_redirects {
                        tracing::debug!(url = %start, depth, "redirect bound exceeded");
                        return (
                            LinkOutcome::TooManyRedirects {
                                max: self.settings.max_redirects,
                            },
                            moved_to(start, &current),
                        );
                    }
                    tracing::debug!(from = %current, to = %next, depth, "following redirect");
                    current = next;
                    continue;
                }
            }

            return (analyze_status(status), moved_to(start, &current));
        }
    }
}

#[async_trait]
impl LinkProbe for HttpChecker {
    async fn check(&self, link: DiscoveredLink) -> ValidationRecord {
        let url = match parse_checkable(&link.url) {
            Some(url) => url,
            None => return ValidationRecord::new(link, LinkOutcome::InvalidUrl),
        };

        if let Some(rule) = self.skip_rule_for(&url) {
            tracing::debug!(url = %url, domain = %rule.domain, "skipping probe");
            let outcome = LinkOutcome::Skipped {
                reason: rule.reason.clone(),
            };
            return ValidationRecord::new(link, outcome);
        }

        // One budget for the whole chain, whichever hop is in flight
        let (outcome, final_url) = match tokio::time::timeout(self.settings.timeout, self.follow(&url)).await {
            Ok(result) => result,
            Err(_) => (LinkOutcome::Timeout, None),
        };

        tracing::debug!(url = %link.url, valid = outcome.is_valid(), "checked link");
        ValidationRecord::new(link, outcome).with_final_url(final_url)
    }
}

// Only absolute http(s) URLs with a host are worth a request
fn parse_checkable(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return None;
    }
    Url::parse(raw).ok().filter(|url| url.host_str().is_some())
}

// Resolves a Location header against the URL that produced it.
//
// Url::join handles both absolute ("https://b.example/x") and relative
// ("/x", "../x") locations.
fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    let location = response.headers().get(header::LOCATION)?.to_str().ok()?.trim();
    if location.is_empty() {
        return None;
    }
    current
        .join(location)
        .ok()
        .filter(|next| matches!(next.scheme(), "http" | "https"))
}

fn moved_to(start: &Url, current: &Url) -> Option<String> {
    (start != current).then(|| current.to_string())
}

fn analyze_status(status: StatusCode) -> LinkOutcome {
    let code = status.as_u16();
    if status.is_success() {
        LinkOutcome::Ok { code }
    } else {
        LinkOutcome::HttpStatus { code }
    }
}

// Sorts reqwest errors into the small taxonomy the report shows.
//
// reqwest wraps hyper which wraps io errors, so the useful text is usually
// the innermost source; DNS failures are only recognisable from the text.
fn categorize_error(error: &reqwest::Error) -> LinkOutcome {
    if error.is_timeout() {
        return LinkOutcome::Timeout;
    }

    let chain = error_chain(error);
    let root = chain.last().cloned().unwrap_or_else(|| error.to_string());

    if is_dns_failure(&chain.join(": ")) {
        let detail = error
            .url()
            .and_then(|url| url.host_str())
            .map(str::to_string)
            .unwrap_or_else(|| strip_socket_addrs(&root));
        return LinkOutcome::UnknownHost { detail };
    }

    let detail = strip_socket_addrs(&root);
    if error.is_connect() {
        LinkOutcome::ConnectionFailed { detail }
    } else {
        LinkOutcome::NetworkError { detail }
    }
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut source = error.source();
    while let Some(inner) = source {
        messages.push(inner.to_string());
        source = inner.source();
    }
    messages
}

fn is_dns_failure(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    text.contains("dns error")
        || text.contains("failed to lookup address")
        || text.contains("name or service not known")
        || text.contains("nodename nor servname")
        || text.contains("no such host")
}

// Drops "ip:port" fragments from error text so messages read the same
// regardless of which address a host resolved to
fn strip_socket_addrs(text: &str) -> String {
    let cleaned = SOCKET_ADDR.replace_all(text, "");
    cleaned.trim().trim_end_matches(':').trim().to_string()
}
