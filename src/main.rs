use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use seoul_now::config::{AppContext, Config};
use seoul_now::stats::options::{available_options, headline_stats};
use seoul_now::{
    aggregate_with, load_events, logging, metrics, parse_price_info, parse_timestamp,
    simple_price_display, validate_events, validate_price_consistency, EventRecord,
};

#[derive(Parser)]
#[command(name = "seoul_now")]
#[command(about = "Price parsing and statistics for Seoul cultural events")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print Prometheus metrics for this run to stderr on exit
    #[arg(long, global = true)]
    emit_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse fee text into structured price information
    Price {
        /// Free-text fee field (USE_FEE)
        #[arg(long)]
        use_fee: Option<String>,
        /// Free-text ticket field (TICKET)
        #[arg(long)]
        ticket: Option<String>,
        /// Categorical free flag (IS_FREE), e.g. 무료 or 유료
        #[arg(long)]
        is_free: Option<String>,
    },
    /// Aggregate dashboard statistics from an events file
    Stats {
        /// JSON file with events (array, paged `items` response, or raw open-data rows)
        #[arg(long)]
        input: PathBuf,
        /// Reference time (RFC 3339 or YYYY-MM-DD); defaults to now
        #[arg(long)]
        now: Option<String>,
    },
    /// Check parsed prices against the free flag for the first N events
    Validate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List filter options and headline counts for an events file
    Options {
        #[arg(long)]
        input: PathBuf,
    },
    /// Show the resolved configuration
    Config,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedConfig<'a> {
    config: &'a Config,
    api_base_url: &'a str,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_events(input: &Path) -> Result<Vec<EventRecord>> {
    let events = load_events(input)
        .with_context(|| format!("Failed to load events from {}", input.display()))?;
    info!("Loaded {} events from {}", events.len(), input.display());
    Ok(events)
}

fn reference_time(now: Option<&str>) -> Result<DateTime<Utc>> {
    match now {
        Some(value) => parse_timestamp(value)
            .with_context(|| format!("Could not parse reference time '{}'", value)),
        None => Ok(Utc::now()),
    }
}

fn run(cli: Cli, context: &AppContext) -> Result<()> {
    let config = context.config();

    match cli.command {
        Commands::Price {
            use_fee,
            ticket,
            is_free,
        } => {
            let info = parse_price_info(use_fee.as_deref(), ticket.as_deref(), is_free.as_deref());
            let consistency = validate_price_consistency(&info, is_free.as_deref());
            if !consistency.is_consistent {
                for issue in &consistency.issues {
                    warn!("Price inconsistency: {}", issue);
                }
            }
            print_json(&json!({
                "price": info,
                "simpleDisplay": simple_price_display(&info),
                "consistency": consistency,
            }))?;
        }
        Commands::Stats { input, now } => {
            let events = read_events(&input)?;
            let now = reference_time(now.as_deref())?;
            let summary = aggregate_with(&events, now, &config.analytics);
            print_json(&summary)?;
        }
        Commands::Validate { input, limit } => {
            let events = read_events(&input)?;
            let limit = limit.unwrap_or(config.display.validation_limit);
            let report = validate_events(&events, limit);
            if report.inconsistent > 0 {
                warn!("{} of {} events have inconsistent price data", report.inconsistent, report.checked);
            }
            print_json(&report)?;
        }
        Commands::Options { input } => {
            let events = read_events(&input)?;
            print_json(&json!({
                "options": available_options(&events),
                "headline": headline_stats(&events, config.display.popular_districts),
            }))?;
        }
        Commands::Config => {
            print_json(&ResolvedConfig {
                config,
                api_base_url: context.api_base_url(),
            })?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let _log_guard = logging::init_logging(&config.logging);

    if cli.emit_metrics {
        metrics::install_recorder();
    }

    let context = AppContext::new(config);
    let emit_metrics = cli.emit_metrics;
    let result = run(cli, &context);

    if emit_metrics {
        if let Some(rendered) = metrics::render() {
            eprintln!("{}", rendered);
        }
    }

    result
}
