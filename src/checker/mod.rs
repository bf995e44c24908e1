// src/checker/mod.rs
// =============================================================================
// This module contains all link checking logic.
//
// Submodules:
// - record: the data types that flow through the pipeline
// - http: checks one link over HTTP and classifies the result
// - html: extracts links from assignment markup
//
// This file (mod.rs) is the module root - it re-exports the public API so the
// rest of the crate can write `checker::HttpChecker` instead of
// `checker::http::HttpChecker`.
// =============================================================================

mod html;
mod http;
mod record;

pub use html::extract_html_links;
pub use http::{CheckSettings, HttpChecker, LinkProbe};
#[cfg(test)]
pub use http::client_builder;
pub use record::{DiscoveredLink, LinkOutcome, OriginContext, ValidationRecord};
