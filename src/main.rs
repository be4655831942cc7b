//! # ozcryptonews
//!
//! Tracks Australian regulator and crypto news. Article metadata (date,
//! source, URL, title) is harvested from HTML listings, RSS/Atom feeds and
//! WordPress REST APIs into one shared CSV ledger. New rows are relayed to a
//! Telegram chat, and the ledger can be committed and pushed to a git remote.
//!
//! ## Usage
//!
//! ```sh
//! ozcryptonews harvest
//! ozcryptonews notify
//! ozcryptonews publish
//! ```
//!
//! ## Architecture
//!
//! Every subcommand is a single sequential pass over the ledger:
//! 1. **Harvest**: each configured source runs through the shared
//!    fetch / extract / filter / append pipeline in [`harvest`]
//! 2. **Notify**: pending rows are delivered and flagged by [`notify`]
//! 3. **Publish**: [`publisher`] runs `git add`, `commit` and `push`

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod dates;
mod fetch;
mod harvest;
mod keywords;
mod ledger;
mod models;
mod notify;
mod publisher;
mod utils;

use cli::{Cli, Command};
use config::Config;
use fetch::HttpFetcher;
use harvest::{AnySource, Harvester, Source};
use keywords::Keywords;
use ledger::Ledger;
use notify::{Notifier, TelegramChannel};
use publisher::Publisher;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ozcryptonews starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.command, ?args.config, "Parsed CLI arguments");

    let mut config = Config::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    info!(
        ledger = %config.ledger.display(),
        min_year = config.min_year,
        sources = config.sources.len(),
        "Configuration ready"
    );

    let result = match &args.command {
        Command::Harvest { sources } => run_harvest(&config, sources).await,
        Command::Sources => {
            list_sources(&config);
            Ok(())
        }
        Command::Notify {
            telegram_token,
            telegram_chat_id,
            delay_ms,
        } => run_notify(&config, telegram_token.clone(), telegram_chat_id.clone(), *delay_ms).await,
        Command::Publish => run_publish(&config).await,
    };

    let elapsed = start_time.elapsed();
    match &result {
        Ok(()) => info!(
            ?elapsed,
            secs = elapsed.as_secs(),
            millis = elapsed.subsec_millis(),
            "Execution complete"
        ),
        Err(e) => error!(?elapsed, error = %e, "Execution failed"),
    }
    result
}

/// Run the selected sources one after another against the ledger.
///
/// A source whose ledger or memo I/O fails is skipped; the command still
/// runs the remaining sources and then reports failure.
async fn run_harvest(config: &Config, ids: &[String]) -> Result<(), Box<dyn Error>> {
    let selected = config.select_sources(ids)?;
    let sources = selected
        .iter()
        .map(|source| AnySource::from_config(source))
        .collect::<Result<Vec<_>, _>>()?;

    let ledger = Ledger::open(&config.ledger);
    let fetcher = HttpFetcher::new(Duration::from_secs(config.request_timeout_secs), &config.user_agent)?;
    let global_keywords = Keywords::load(&config.keywords_file).await;
    let harvester = Harvester::new(&ledger, &fetcher, config.min_year)
        .with_request_delay(Duration::from_millis(config.request_delay_ms));

    let mut appended = 0;
    let mut failed = Vec::new();
    for (source_config, source) in selected.iter().zip(&sources) {
        let own_keywords;
        let keywords = match &source_config.keywords_file {
            Some(path) => {
                own_keywords = Keywords::load(path).await;
                &own_keywords
            }
            None => &global_keywords,
        };

        match harvester.run(source, keywords).await {
            Ok(report) => appended += report.appended,
            Err(e) => {
                error!(source = source.id(), error = %e, "Source aborted; nothing written for it");
                failed.push(source.id().to_string());
            }
        }
    }

    info!(sources = sources.len(), appended, failed = failed.len(), "Harvest finished");
    if !failed.is_empty() {
        return Err(format!("{} source(s) failed: {}", failed.len(), failed.join(", ")).into());
    }
    Ok(())
}

fn list_sources(config: &Config) {
    for source in &config.sources {
        println!("{}\t{}\t{}", source.id, source.kind.as_str(), source.urls.join(" "));
    }
}

async fn run_notify(
    config: &Config,
    token: Option<String>,
    chat_id: Option<String>,
    delay_ms: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let telegram = &config.notifier.telegram;
    let token = token
        .or_else(|| telegram.bot_token.clone())
        .ok_or("missing Telegram bot token (--telegram-token, TELEGRAM_BOT_TOKEN or notifier.telegram.bot_token)")?;
    let chat_id = chat_id
        .or_else(|| telegram.chat_id.clone())
        .ok_or("missing Telegram chat id (--telegram-chat-id, TELEGRAM_CHAT_ID or notifier.telegram.chat_id)")?;

    let channel = TelegramChannel::new(token, chat_id, Duration::from_secs(config.request_timeout_secs))?;
    let delay = Duration::from_millis(delay_ms.unwrap_or(config.notifier.delay_ms));
    let report = Notifier::new(delay)
        .run(&Ledger::open(&config.ledger), &channel)
        .await?;

    if report.failed > 0 {
        warn!(failed = report.failed, "Some rows were not delivered; they stay pending");
    }
    Ok(())
}

async fn run_publish(config: &Config) -> Result<(), Box<dyn Error>> {
    Publisher::new(&config.publisher).publish(&config.ledger).await?;
    Ok(())
}
