//! Data models for harvested articles and ledger rows.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ArticleRecord`]: A newly discovered article, ready to be appended
//! - [`LedgerRow`]: A row as it sits on disk, read back verbatim
//! - [`LedgerEntry`]: One ledger record, parsed or kept as raw text
//! - [`Candidate`]: An item pulled from a listing page before filtering
//! - [`DoneFlag`]: The per-row notification marker

use chrono::{DateTime, Utc};

use crate::dates::format_utc;

/// Column names of the ledger file, in order.
pub const LEDGER_HEADER: [&str; 5] = ["date", "source", "url", "title", "done"];

/// Marker written to the `done` column once a row has been relayed.
pub const DONE_MARK: &str = "+";

/// Whether a ledger row has been relayed by the notifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DoneFlag {
    /// Not yet relayed (`''` on disk).
    #[default]
    Pending,
    /// Relayed successfully (`'+'` on disk).
    Notified,
}

impl DoneFlag {
    /// Interpret a raw `done` column value. Surrounding whitespace is ignored.
    pub fn from_field(value: &str) -> Self {
        if value.trim() == DONE_MARK {
            DoneFlag::Notified
        } else {
            DoneFlag::Pending
        }
    }

    /// The on-disk representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DoneFlag::Pending => "",
            DoneFlag::Notified => DONE_MARK,
        }
    }
}

/// A newly discovered article.
///
/// The date is always an aware UTC timestamp; it only becomes text when the
/// record is turned into a [`LedgerRow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    /// Publication time, normalized to UTC.
    pub date: DateTime<Utc>,
    /// Identifier of the origin site or feed, e.g. `asic.gov.au`.
    pub source: String,
    /// Absolute article URL; unique within a source.
    pub url: String,
    /// Human-readable headline.
    pub title: String,
    /// Notification state.
    pub done: DoneFlag,
}

impl ArticleRecord {
    pub fn new(
        date: DateTime<Utc>,
        source: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            date,
            source: source.into(),
            url: url.into(),
            title: title.into(),
            done: DoneFlag::Pending,
        }
    }

    /// Render the record the way it is written to the ledger.
    pub fn to_row(&self) -> LedgerRow {
        LedgerRow {
            date: format_utc(&self.date),
            source: self.source.clone(),
            url: self.url.clone(),
            title: self.title.clone(),
            done: self.done.as_str().to_string(),
        }
    }
}

/// A ledger row exactly as stored.
///
/// Fields stay as text so rows that were edited by hand survive a notifier
/// rewrite unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub date: String,
    pub source: String,
    pub url: String,
    pub title: String,
    pub done: String,
}

impl LedgerRow {
    /// Build a row from a CSV record. Returns `None` when the column count is wrong.
    pub fn from_record(record: &csv::StringRecord) -> Option<Self> {
        if record.len() != LEDGER_HEADER.len() {
            return None;
        }
        Some(Self {
            date: record[0].to_string(),
            source: record[1].to_string(),
            url: record[2].to_string(),
            title: record[3].to_string(),
            done: record[4].to_string(),
        })
    }

    pub fn as_record(&self) -> [&str; 5] {
        [&self.date, &self.source, &self.url, &self.title, &self.done]
    }

    pub fn done_flag(&self) -> DoneFlag {
        DoneFlag::from_field(&self.done)
    }

    pub fn mark_done(&mut self) {
        self.done = DONE_MARK.to_string();
    }
}

/// One record of the ledger, in file order.
///
/// Records with the wrong number of columns (an unquoted comma in a title
/// written by an older script, say) cannot be interpreted, but they are still
/// part of the ledger and are written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    Row(LedgerRow),
    /// The record's original text, without its line terminator.
    Unparsed(String),
}

impl LedgerEntry {
    pub fn row(&self) -> Option<&LedgerRow> {
        match self {
            LedgerEntry::Row(row) => Some(row),
            LedgerEntry::Unparsed(_) => None,
        }
    }

    pub fn into_row(self) -> Option<LedgerRow> {
        match self {
            LedgerEntry::Row(row) => Some(row),
            LedgerEntry::Unparsed(_) => None,
        }
    }

    /// Flag a parsed row as notified. Unparsed records are left alone.
    pub fn mark_done(&mut self) {
        if let LedgerEntry::Row(row) = self {
            row.mark_done();
        }
    }
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        LedgerEntry::Row(row)
    }
}

/// An item extracted from a listing page, feed or API response.
///
/// Everything except the URL is optional at this stage; the harvester decides
/// what to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute article URL.
    pub url: String,
    /// Headline, if the listing carries one.
    pub title: Option<String>,
    /// Raw date text in whatever format the source uses.
    pub date_text: Option<String>,
    /// Summary or article text, used only for keyword matching.
    pub body: Option<String>,
}

impl Candidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_date(mut self, date_text: impl Into<String>) -> Self {
        self.date_text = Some(date_text.into());
        self
    }

    /// Title and body joined, for keyword matching.
    pub fn searchable_text(&self) -> String {
        let title = self.title.as_deref().unwrap_or_default();
        match self.body.as_deref() {
            Some(body) if !body.is_empty() => format!("{title} {body}"),
            _ => title.to_string(),
        }
    }
}
