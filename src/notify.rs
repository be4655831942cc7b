//! Relays un-notified ledger rows to a messaging channel.
//!
//! Each pending row becomes one message. Rows whose delivery succeeds are
//! flagged `+` in a single rewrite at the end of the run; failed rows stay
//! pending and are retried next time.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::ledger::{Ledger, LedgerError};
use crate::models::{DoneFlag, LedgerRow};
use crate::utils::truncate_for_log;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("rejected with HTTP {status}: {description}")]
    Rejected { status: u16, description: String },
}

/// Somewhere a formatted message can be sent.
pub trait DeliveryChannel {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError>;
}

/// Telegram Bot API `sendMessage` with HTML formatting.
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    client: reqwest::Client,
    token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramChannel {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DeliveryError::Client)?;
        Ok(Self {
            client,
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }
}

impl DeliveryChannel for TelegramChannel {
    #[instrument(level = "debug", skip_all, fields(chat_id = %self.chat_id))]
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        let url = format!("{TELEGRAM_API}/bot{}/sendMessage", self.token);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": message,
                "parse_mode": "HTML",
            }))
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Request(e.without_url()))?;
        let parsed: Option<TelegramResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => {
                debug!("Message delivered");
                Ok(())
            }
            parsed => Err(DeliveryError::Rejected {
                status: status.as_u16(),
                description: parsed
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| truncate_for_log(&body, 200)),
            }),
        }
    }
}

/// Outcome of one notifier run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub pending: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    delay: Duration,
}

impl Notifier {
    /// `delay` is waited between delivery attempts, never after the last one.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Deliver every pending row and flag the delivered ones.
    ///
    /// A missing or empty ledger is created with its header and nothing is
    /// sent. The ledger is rewritten only if at least one delivery succeeded.
    ///
    /// # Errors
    ///
    /// Ledger read or rewrite failures. Delivery failures are per-row and are
    /// only counted.
    #[instrument(level = "info", skip_all, fields(path = %ledger.path().display()))]
    pub async fn run<C: DeliveryChannel>(&self, ledger: &Ledger, channel: &C) -> Result<NotifyReport, LedgerError> {
        if ledger.ensure_initialized()? {
            info!("Ledger was missing or empty; initialized it, nothing to send");
            return Ok(NotifyReport::default());
        }

        let mut entries = ledger.read_all()?;
        let pending: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.row().is_some_and(|row| row.done_flag() == DoneFlag::Pending))
            .map(|(i, _)| i)
            .collect();

        let mut report = NotifyReport {
            pending: pending.len(),
            ..NotifyReport::default()
        };
        if pending.is_empty() {
            info!("No pending rows");
            return Ok(report);
        }

        for (attempt, &index) in pending.iter().enumerate() {
            if attempt > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let Some(row) = entries[index].row() else {
                continue;
            };
            match channel.deliver(&format_message(row)).await {
                Ok(()) => {
                    info!(row = index + 1, title = %row.title, "Delivered");
                    entries[index].mark_done();
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(row = index + 1, url = %row.url, error = %e, "Delivery failed; will retry next run");
                    report.failed += 1;
                }
            }
        }

        if report.delivered > 0 {
            ledger.rewrite(&entries)?;
        }
        info!(
            pending = report.pending,
            delivered = report.delivered,
            failed = report.failed,
            "Notifier run complete"
        );
        Ok(report)
    }
}

/// Render a ledger row as an HTML chat message.
pub fn format_message(row: &LedgerRow) -> String {
    let link = if row.url.trim().is_empty() {
        "No URL provided".to_string()
    } else {
        let url = escape_html(&row.url);
        format!("<a href=\"{url}\">{url}</a>")
    };
    format!(
        "\u{1f4f0} <b>New Article Found!</b>\n\n\
         <b>Date:</b> {}\n\
         <b>Source:</b> {}\n\
         <b>Title:</b> {}\n\
         <b>Link:</b> {link}",
        escape_html(&row.date),
        escape_html(&row.source),
        escape_html(&row.title),
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
