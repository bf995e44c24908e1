// src/report.rs
// =============================================================================
// Turns a cache entry into something a person (or a script) can read.
//
// - A summary: how many links were checked, how many are valid / broken
// - A table of broken links, or of every link with --all
// - The same data as JSON with --json
// - A "Last updated" line, or "No data yet" before the first successful run
// =============================================================================

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheEntry;
use crate::checker::{LinkOutcome, ValidationRecord};

const URL_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub checked: usize,
    pub valid: usize,
    pub invalid: usize,
}

impl Summary {
    pub fn from_records(records: &[ValidationRecord]) -> Self {
        let valid = records.iter().filter(|r| r.valid).count();
        Self {
            checked: records.len(),
            valid,
            invalid: records.len() - valid,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    last_updated: Option<DateTime<Utc>>,
    summary: Summary,
    results: Vec<&'a ValidationRecord>,
}

// Prints a report for `entry` to stdout.
//
// `show_all` lists every link instead of only the broken ones.
pub fn print_report(entry: Option<&CacheEntry>, json: bool, show_all: bool) -> Result<()> {
    if json {
        println!("{}", render_json(entry, show_all)?);
        return Ok(());
    }

    let entry = match entry {
        Some(entry) => entry,
        None => {
            println!("{}", format_last_updated(None));
            return Ok(());
        }
    };

    let summary = Summary::from_records(&entry.results);
    println!("{}", format_last_updated(Some(entry.last_updated)));
    println!();
    print!("{}", render_table(&entry.results, show_all));
    println!();
    println!("📊 Summary:");
    println!("   📋 Checked links: {}", summary.checked);
    println!("   ✅ Valid links: {}", summary.valid);
    println!("   ❌ Invalid links: {}", summary.invalid);
    Ok(())
}

pub fn render_json(entry: Option<&CacheEntry>, show_all: bool) -> Result<String> {
    let records = entry.map(|e| e.results.as_slice()).unwrap_or_default();
    let report = JsonReport {
        last_updated: entry.map(|e| e.last_updated),
        summary: Summary::from_records(records),
        results: selected(records, show_all),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn format_last_updated(last_updated: Option<DateTime<Utc>>) -> String {
    match last_updated {
        Some(ts) => format!("Last updated: {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => "No data yet: links have not been checked successfully so far".to_string(),
    }
}

pub fn render_table(records: &[ValidationRecord], show_all: bool) -> String {
    let rows = selected(records, show_all);
    if rows.is_empty() {
        return if show_all {
            "No links found\n".to_string()
        } else {
            "✅ No broken links\n".to_string()
        };
    }

    let mut out = format!(
        "{:<60} {:<22} {:<30} {}\n",
        "URL", "STATUS", "MESSAGE", "FOUND IN"
    );
    out.push_str(&"=".repeat(130));
    out.push('\n');
    for record in rows {
        out.push_str(&format!(
            "{:<60} {:<22} {:<30} {}\n",
            truncate(&record.url, URL_WIDTH),
            format_status(&record.outcome),
            record.status_message,
            record.origin
        ));
    }
    out
}

// Broken links first, then grouped by course and assignment
fn selected(records: &[ValidationRecord], show_all: bool) -> Vec<&ValidationRecord> {
    let mut rows: Vec<&ValidationRecord> = records
        .iter()
        .filter(|r| show_all || !r.valid)
        .collect();
    rows.sort_by(|a, b| {
        a.valid
            .cmp(&b.valid)
            .then_with(|| a.origin.group.cmp(&b.origin.group))
            .then_with(|| a.origin.item.cmp(&b.origin.item))
            .then_with(|| a.url.cmp(&b.url))
    });
    rows
}

fn truncate(url: &str, width: usize) -> String {
    if url.chars().count() > width {
        let head: String = url.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        url.to_string()
    }
}

fn format_status(outcome: &LinkOutcome) -> &'static str {
    match outcome {
        LinkOutcome::Ok { .. } => "✅ OK",
        LinkOutcome::Skipped { .. } => "⏭️  SKIPPED",
        LinkOutcome::InvalidUrl => "⚠️  INVALID URL",
        LinkOutcome::TooManyRedirects { .. } => "🔁 TOO MANY REDIRECTS",
        LinkOutcome::HttpStatus { .. } => "❌ BROKEN",
        LinkOutcome::Timeout => "⏱️  TIMEOUT",
        LinkOutcome::ConnectionFailed { .. } => "🔌 CONNECTION FAILED",
        LinkOutcome::UnknownHost { .. } => "🌐 DNS ERROR",
        LinkOutcome::NetworkError { .. } => "⚠️  ERROR",
    }
}
