// src/moodle/mod.rs
// =============================================================================
// This module fetches assignment links from a Moodle site.
//
// Currently implements:
// - Listing courses through the REST web service (core_course_get_courses)
// - Fetching each course's assignments (mod_assign_get_assignments)
// - Extracting the links from every assignment's intro HTML
//
// The cache only sees the LinkSource trait, so anything that can produce
// discovered links (tests included) can feed the pipeline.
// =============================================================================

mod client;
mod error;

pub use client::MoodleClient;
pub use error::SourceError;

use async_trait::async_trait;

use crate::checker::DiscoveredLink;

// Produces the full set of candidate links for one validation run.
//
// An Err fails the whole run: callers never get a partial link set.
#[async_trait]
pub trait LinkSource: Send + Sync {
    async fn fetch_links(&self) -> Result<Vec<DiscoveredLink>, SourceError>;
}
