//! Command-line interface definitions for ozcryptonews.
//!
//! This module defines the CLI arguments and subcommands using the `clap` crate.
//! Secrets can be provided via command-line flags or environment variables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

/// Command-line arguments for the ozcryptonews application.
///
/// Global options override the matching fields of the config file; the
/// subcommand selects what to run.
///
/// # Examples
///
/// ```sh
/// # Harvest every configured source into ./articles.csv
/// ozcryptonews harvest
///
/// # Harvest two sources into a different ledger
/// ozcryptonews -l data/articles.csv harvest -s asic.gov.au -s austrac.gov.au
///
/// # Relay new rows to Telegram
/// TELEGRAM_BOT_TOKEN=... TELEGRAM_CHAT_ID=... ozcryptonews notify
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "OZCN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Ledger CSV path (overrides the config file)
    #[arg(short, long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Discard articles published before this year (overrides the config file)
    #[arg(long, global = true)]
    pub min_year: Option<i32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch configured sources and append new articles to the ledger
    Harvest {
        /// Only run these source ids (repeatable); all sources when omitted
        #[arg(short, long = "source")]
        sources: Vec<String>,
    },

    /// List configured sources
    Sources,

    /// Send pending ledger rows to Telegram and flag them as done
    Notify {
        /// Telegram bot token
        #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
        telegram_token: Option<String>,

        /// Telegram chat id
        #[arg(long, env = "TELEGRAM_CHAT_ID")]
        telegram_chat_id: Option<String>,

        /// Milliseconds to wait between messages (overrides the config file)
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Commit the ledger and push it to the configured remote
    Publish,
}

impl Cli {
    /// Apply the global overrides to a loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ledger) = &self.ledger {
            config.ledger = ledger.clone();
        }
        if let Some(min_year) = self.min_year {
            config.min_year = min_year;
        }
    }
}
