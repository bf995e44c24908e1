// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Global flags override values from the config file / environment, so a
// quick run can be tweaked without editing anything:
//
//   lms-link-checker --moodle-url https://lms.example.org check --all
//   lms-link-checker watch --interval-mins 30 --json
// =============================================================================

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "lms-link-checker",
    version,
    about = "Checks the links in Moodle assignments for broken pages",
    long_about = "lms-link-checker collects every link from the assignment descriptions of a Moodle \
                  site, checks each one over HTTP and reports the broken ones. The watch command \
                  keeps the results cached and re-checks them once they are older than the TTL."
)]
pub struct Cli {
    /// TOML config file (overrides LINK_CHECKER_CONFIG_FILE)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Moodle site root, e.g. https://lms.example.org
    #[arg(long, global = true)]
    pub moodle_url: Option<String>,

    /// Maximum number of links checked at the same time
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Time budget for checking one link, in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check every assignment link once and print a report
    ///
    /// Exit code: 0 = no broken links, 1 = broken links found, 2 = error
    Check {
        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,

        /// List every link, not only the broken ones
        #[arg(long)]
        all: bool,
    },

    /// Keep results cached and print a report every interval
    ///
    /// Links are only re-checked once the cached results are older than
    /// the cache TTL.
    Watch {
        /// Minutes between reports (1 to 10080, one week)
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..=10_080))]
        interval_mins: u64,

        /// Cache TTL in hours (overrides the configured value)
        #[arg(long)]
        cache_ttl_hours: Option<u64>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,

        /// List every link, not only the broken ones
        #[arg(long)]
        all: bool,
    },
}

impl Cli {
    // Applies flags given on the command line on top of the loaded config
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(url) = &self.moodle_url {
            config.moodle_base_url = Some(url.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }
        if let Commands::Watch {
            cache_ttl_hours: Some(ttl),
            ..
        } = self.command
        {
            config.cache_ttl_hours = ttl;
        }
    }
}


// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why Option<...> for the global flags?
//    - None means "not given on the command line", so the value from the
//      config file or environment stays in place
//    - A plain default_value_t would always win over the config file
//
// 2. What does `global = true` do?
//    - The flag is accepted before or after the subcommand name
//    - `lms-link-checker --concurrency 4 check` and
//      `lms-link-checker check --concurrency 4` mean the same thing
// -----------------------------------------------------------------------------
