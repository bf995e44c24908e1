// src/checker/record.rs
// =============================================================================
// Data types shared by the checker, the validator and the cache.
//
// - DiscoveredLink: a link as found in an assignment, plus where it was found
// - OriginContext: the (course, assignment) pair a link belongs to
// - LinkOutcome: the classified result of one check (errors are data here)
// - ValidationRecord: what the pipeline hands back for each distinct URL
//
// Every failure a single link can run into is a LinkOutcome variant, so a
// check always produces a record and never an Err.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

// Where a link was discovered.
//
// The pipeline carries this through untouched; only the report prints it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginContext {
    /// Logical group, e.g. a course short name
    pub group: String,
    /// Record inside the group, e.g. an assignment name
    pub item: String,
}

impl OriginContext {
    pub fn new(group: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            item: item.into(),
        }
    }
}

impl fmt::Display for OriginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.group, self.item)
    }
}

// A candidate link handed to the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    pub url: String,
    pub origin: OriginContext,
}

impl DiscoveredLink {
    pub fn new(url: impl Into<String>, origin: OriginContext) -> Self {
        Self {
            url: url.into(),
            origin,
        }
    }
}

// Classified outcome of checking one link.
//
// #[serde(tag = "kind")] gives {"kind": "http_status", "code": 404} in JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkOutcome {
    /// Terminal 2xx response
    Ok { code: u16 },
    /// Host is on the skip list; no request was made
    Skipped { reason: String },
    /// Not an http(s) URL, or unparseable
    InvalidUrl,
    /// Redirect chain longer than the configured bound
    TooManyRedirects { max: usize },
    /// Terminal non-2xx response
    HttpStatus { code: u16 },
    /// Request or whole check ran out of time
    Timeout,
    /// Connection refused / unreachable
    ConnectionFailed { detail: String },
    /// DNS resolution failed
    UnknownHost { detail: String },
    /// Anything else the transport reported
    NetworkError { detail: String },
}

impl LinkOutcome {
    /// True for 2xx responses and skip-listed hosts
    pub fn is_valid(&self) -> bool {
        matches!(self, LinkOutcome::Ok { .. } | LinkOutcome::Skipped { .. })
    }

    /// Human-readable description stored as the record's status message
    pub fn describe(&self) -> String {
        match self {
            LinkOutcome::Ok { code } | LinkOutcome::HttpStatus { code } => {
                describe_status(*code)
            }
            LinkOutcome::Skipped { reason } => reason.clone(),
            LinkOutcome::InvalidUrl => "Invalid URL format".to_string(),
            LinkOutcome::TooManyRedirects { max } => {
                format!("Too many redirects (max {} allowed)", max)
            }
            LinkOutcome::Timeout => "Connection timed out".to_string(),
            LinkOutcome::ConnectionFailed { detail } => format!("Connection failed: {}", detail),
            LinkOutcome::UnknownHost { detail } => format!("Unknown host: {}", detail),
            LinkOutcome::NetworkError { detail } => format!("Network error: {}", detail),
        }
    }
}

// Maps the status codes people actually run into to readable phrases
fn describe_status(code: u16) -> String {
    match code {
        200 => "OK".to_string(),
        403 => "Access Forbidden".to_string(),
        404 => "Page Not Found".to_string(),
        429 => "Too Many Requests".to_string(),
        500 => "Internal Server Error".to_string(),
        503 => "Service Unavailable".to_string(),
        other => format!("HTTP {}", other),
    }
}

// Result of validating one distinct URL.
//
// Built only through ValidationRecord::new so `valid` and `status_message`
// can never disagree with `outcome`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// The URL exactly as it was discovered
    pub url: String,
    pub valid: bool,
    pub origin: OriginContext,
    pub status_message: String,
    pub outcome: LinkOutcome,
    /// Where the redirect chain ended, if any redirect was followed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
}

impl ValidationRecord {
    pub fn new(link: DiscoveredLink, outcome: LinkOutcome) -> Self {
        Self {
            url: link.url,
            valid: outcome.is_valid(),
            origin: link.origin,
            status_message: outcome.describe(),
            outcome,
            final_url: None,
        }
    }

    pub fn with_final_url(mut self, final_url: Option<String>) -> Self {
        self.final_url = final_url;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: &str) -> DiscoveredLink {
        DiscoveredLink::new(url, OriginContext::new("Course1", "Task1"))
    }

    #[test]
    fn test_known_codes_have_phrases() {
        assert_eq!(LinkOutcome::Ok { code: 200 }.describe(), "OK");
        assert_eq!(LinkOutcome::HttpStatus { code: 403 }.describe(), "Access Forbidden");
        assert_eq!(LinkOutcome::HttpStatus { code: 404 }.describe(), "Page Not Found");
        assert_eq!(LinkOutcome::HttpStatus { code: 429 }.describe(), "Too Many Requests");
        assert_eq!(LinkOutcome::HttpStatus { code: 500 }.describe(), "Internal Server Error");
        assert_eq!(LinkOutcome::HttpStatus { code: 503 }.describe(), "Service Unavailable");
        assert_eq!(LinkOutcome::HttpStatus { code: 418 }.describe(), "HTTP 418");
        assert_eq!(LinkOutcome::Ok { code: 204 }.describe(), "HTTP 204");
    }

    #[test]
    fn test_record_validity_follows_outcome() {
        let ok = ValidationRecord::new(link("https://a.example"), LinkOutcome::Ok { code: 200 });
        assert!(ok.valid);
        assert_eq!(ok.status_message, "OK");

        let skipped = ValidationRecord::new(
            link("https://figma.com/file/x"),
            LinkOutcome::Skipped { reason: "Figma link (validation skipped)".into() },
        );
        assert!(skipped.valid);

        let broken = ValidationRecord::new(link("ftp://a.example"), LinkOutcome::InvalidUrl);
        assert!(!broken.valid);
        assert_eq!(broken.status_message, "Invalid URL format");
        assert_eq!(broken.origin.to_string(), "Course1 / Task1");
    }

    #[test]
    fn test_too_many_redirects_message() {
        let outcome = LinkOutcome::TooManyRedirects { max: 5 };
        assert!(!outcome.is_valid());
        assert_eq!(outcome.describe(), "Too many redirects (max 5 allowed)");
    }

    #[test]
    fn test_record_serializes_outcome_tag() {
        let record = ValidationRecord::new(link("https://a.example"), LinkOutcome::HttpStatus { code: 404 });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["outcome"]["kind"], "http_status");
        assert_eq!(json["outcome"]["code"], 404);
        assert!(json.get("final_url").is_none());
    }
}
