// src/main.rs
// =============================================================================
// Entry point of the lms-link-checker CLI.
//
// What happens here:
// 1. Parse command-line arguments and set up logging
// 2. Load configuration (defaults, TOML file, environment, CLI flags)
// 3. Wire the pipeline: Moodle source -> validator -> result cache
// 4. Run the subcommand and exit with a proper code
//    (0 = no broken links, 1 = broken links found, 2 = error)
//
// Logs go to stderr so `--json` output on stdout stays machine-readable.
// =============================================================================

mod cache;
mod checker;
mod cli;
mod config;
mod moodle;
mod report;
mod validate;
mod watch;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cache::{CacheEntry, ResultCache};
use checker::{CheckSettings, HttpChecker};
use cli::{Cli, Commands};
use config::AppConfig;
use moodle::MoodleClient;
use validate::Validator;
use watch::Tick;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "run failed");
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let cache = build_cache(&config)?;

    match cli.command {
        Commands::Check { json, all } => handle_check(&cache, json, all).await,
        Commands::Watch {
            interval_mins,
            json,
            all,
            ..
        } => handle_watch(&cache, interval_mins, json, all).await,
    }
}

// Builds the whole pipeline from configuration.
//
// The checker and the Moodle client get separate HTTP clients: link probes
// must not follow redirects on their own, Moodle calls should.
fn build_cache(config: &AppConfig) -> Result<ResultCache> {
    let base_url = config.require_moodle_base_url()?;

    let moodle_http = reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .build()
        .context("building Moodle HTTP client")?;
    let source = MoodleClient::new(
        moodle_http,
        base_url,
        config.moodle_token.clone(),
        config.concurrency,
    )?;

    let checker = HttpChecker::new(CheckSettings::from_config(config))
        .context("building link checker HTTP client")?;
    let validator = Validator::new(Arc::new(checker), config.concurrency);

    Ok(ResultCache::new(
        Arc::new(source),
        validator,
        config.cache_ttl(),
    ))
}

// Handles the 'check' subcommand: one full run, one report
async fn handle_check(cache: &ResultCache, json: bool, all: bool) -> Result<i32> {
    tracing::info!("checking assignment links");

    let entry = cache
        .get_results(true)
        .await
        .context("collecting links from Moodle")?;
    report::print_report(Some(&entry), json, all)?;

    Ok(exit_code_for(&entry))
}

// Handles the 'watch' subcommand.
//
// A failed refresh prints the error and whatever data is still cached.
// Ctrl-C stops the loop, also in the middle of a refresh.
async fn handle_watch(cache: &ResultCache, interval_mins: u64, json: bool, all: bool) -> Result<i32> {
    let period = Duration::from_secs(interval_mins.max(1).saturating_mul(60));

    watch::watch(cache, period, interrupted(), |tick| match tick {
        Tick::Fresh(entry) => report::print_report(Some(&entry), json, all),
        Tick::Failed { error, stale } => {
            eprintln!("⚠️  Refresh failed: {}", error);
            if let Some(entry) = &stale {
                eprintln!(
                    "   Showing last known data from {}",
                    entry.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            report::print_report(stale.as_deref(), json, all)
        }
    })
    .await?;

    Ok(0)
}

// Resolves on Ctrl-C. If the handler cannot be installed the watch runs
// until killed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn exit_code_for(entry: &CacheEntry) -> i32 {
    if entry.broken().next().is_some() {
        1 // Exit code 1 = broken links found
    } else {
        0 // Exit code 0 = all good
    }
}
