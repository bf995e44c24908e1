// src/validate.rs
// =============================================================================
// Runs the link checker over a whole batch of discovered links.
//
// - Drops duplicate URLs before any request is made (first occurrence wins)
// - Runs up to `concurrency` checks at once
// - Collects records in completion order, not input order
//
// A run has no error path of its own: every check already turns its failures
// into a record, so N distinct URLs in means N records out.
// =============================================================================

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};

use crate::checker::{DiscoveredLink, LinkProbe, ValidationRecord};

pub struct Validator {
    probe: Arc<dyn LinkProbe>,
    concurrency: usize,
}

impl Validator {
    pub fn new(probe: Arc<dyn LinkProbe>, concurrency: usize) -> Self {
        Self {
            probe,
            concurrency: concurrency.max(1),
        }
    }

    // Checks every distinct URL in `links`.
    //
    // buffer_unordered keeps at most `concurrency` checks in flight and yields
    // them as they finish. Dropping the returned future drops every in-flight
    // check with it.
    pub async fn validate(&self, links: Vec<DiscoveredLink>) -> Vec<ValidationRecord> {
        let discovered = links.len();
        let unique = dedup_links(links);
        tracing::info!(
            discovered,
            distinct = unique.len(),
            concurrency = self.concurrency,
            "validating links"
        );

        let started = Instant::now();
        let checks = unique.into_iter().map(|link| {
            let probe = self.probe.clone();
            async move { probe.check(link).await }
        });

        let records: Vec<ValidationRecord> = stream::iter(checks)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let broken = records.iter().filter(|r| !r.valid).count();
        tracing::info!(
            checked = records.len(),
            broken,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "validation finished"
        );
        records
    }
}

// Keeps the first occurrence of each URL.
//
// When one URL shows up in several assignments only the first assignment is
// reported for it: the link is checked once and the record carries one origin.
pub fn dedup_links(links: Vec<DiscoveredLink>) -> Vec<DiscoveredLink> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.url.clone()))
        .collect()
}
