//! The shared CSV ledger.
//!
//! Every harvester appends to one flat file with the fixed header
//! `date,source,url,title,done`. Rows are never reordered or removed; the
//! notifier is the only writer that rewrites the file, and only to flip
//! `done` flags.
//!
//! # Operating assumption
//!
//! One writer at a time. There is no cross-process lock: two harvesters
//! appending simultaneously, or a harvester appending while the notifier
//! rewrites, can lose or interleave rows. Schedule the commands serially.
//!
//! # Integrity
//!
//! Every read validates the header first. A missing or mismatched header
//! aborts the operation before anything is written. Records with the wrong
//! column count are kept as raw text: they never count as known URLs or
//! pending notifications, and [`Ledger::rewrite`] writes them back unchanged.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::dates::parse_datetime;
use crate::models::{ArticleRecord, LedgerEntry, LedgerRow, LEDGER_HEADER};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors raised by ledger reads and writes.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger {} has a malformed header: expected `{expected}`, found `{found}`", .path.display())]
    Header {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("I/O error on ledger {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error in ledger {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// What is currently on disk.
enum Contents {
    /// No file at all.
    Missing,
    /// Zero-length, or only a BOM and whitespace.
    Empty,
    /// A valid header followed by zero or more records.
    Rows {
        entries: Vec<LedgerEntry>,
        ends_with_newline: bool,
    },
}

/// Handle to the ledger file. Opening does no I/O.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// URLs already recorded for `source`.
    ///
    /// A missing or empty ledger yields an empty set and is created with the
    /// header as a side effect.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub fn load_existing_urls(&self, source: &str) -> Result<HashSet<String>, LedgerError> {
        match self.load()? {
            Contents::Missing | Contents::Empty => {
                self.initialize()?;
                Ok(HashSet::new())
            }
            Contents::Rows { entries, .. } => {
                let urls: HashSet<String> = entries
                    .into_iter()
                    .filter_map(LedgerEntry::into_row)
                    .filter(|row| row.source == source && !row.url.is_empty())
                    .map(|row| row.url)
                    .collect();
                debug!(count = urls.len(), "Loaded existing URLs");
                Ok(urls)
            }
        }
    }

    /// Most recent parseable date recorded for `source`.
    pub fn latest_date(&self, source: &str) -> Result<Option<DateTime<Utc>>, LedgerError> {
        match self.load()? {
            Contents::Missing | Contents::Empty => Ok(None),
            Contents::Rows { entries, .. } => Ok(entries
                .iter()
                .filter_map(LedgerEntry::row)
                .filter(|row| row.source == source)
                .filter_map(|row| parse_datetime(&row.date).ok())
                .max()),
        }
    }

    /// Every record, in file order. A missing or empty ledger reads as empty.
    pub fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        match self.load()? {
            Contents::Missing | Contents::Empty => Ok(Vec::new()),
            Contents::Rows { entries, .. } => Ok(entries),
        }
    }

    /// Create the file with its header if it is missing or empty.
    ///
    /// Returns `true` when the file was (re)initialized.
    pub fn ensure_initialized(&self) -> Result<bool, LedgerError> {
        match self.load()? {
            Contents::Missing | Contents::Empty => {
                self.initialize()?;
                Ok(true)
            }
            Contents::Rows { .. } => Ok(false),
        }
    }

    /// Append a batch of new records in chronological order.
    ///
    /// The batch is sorted by date (stable, so equal dates keep their input
    /// order). Records whose `(source, url)` is already in the file, or
    /// repeated within the batch, are skipped. The header is written first
    /// when the file is missing or empty. Existing rows are never touched.
    ///
    /// Returns the number of rows written.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), batch = records.len()))]
    pub fn append(&self, mut records: Vec<ArticleRecord>) -> Result<usize, LedgerError> {
        let (mut seen, fresh_file, needs_newline) = match self.load()? {
            Contents::Missing | Contents::Empty => (HashSet::new(), true, false),
            Contents::Rows {
                entries,
                ends_with_newline,
            } => (
                entries
                    .into_iter()
                    .filter_map(LedgerEntry::into_row)
                    .map(|row| (row.source, row.url))
                    .collect::<HashSet<_>>(),
                false,
                !ends_with_newline,
            ),
        };

        records.sort_by_key(|record| record.date);
        let fresh: Vec<ArticleRecord> = records
            .into_iter()
            .filter(|record| {
                let key = (record.source.clone(), record.url.clone());
                let is_new = seen.insert(key);
                if !is_new {
                    debug!(url = %record.url, source = %record.source, "Skipping duplicate ledger entry");
                }
                is_new
            })
            .collect();

        if fresh.is_empty() {
            return Ok(0);
        }

        let mut file = if fresh_file {
            self.create_parent()?;
            File::create(&self.path).map_err(|e| self.io_err(e))?
        } else {
            OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map_err(|e| self.io_err(e))?
        };
        if needs_newline {
            file.write_all(b"\n").map_err(|e| self.io_err(e))?;
        }

        let mut writer = csv_writer(file);
        if fresh_file {
            writer
                .write_record(LEDGER_HEADER)
                .map_err(|e| self.csv_err(e))?;
        }
        for record in &fresh {
            writer
                .write_record(record.to_row().as_record())
                .map_err(|e| self.csv_err(e))?;
        }
        writer.flush().map_err(|e| self.io_err(e))?;

        info!(appended = fresh.len(), "Appended rows to ledger");
        Ok(fresh.len())
    }

    /// Replace the whole file with `entries`.
    ///
    /// Unparsed records are written back exactly as they were read. Writes to
    /// a sibling `*.tmp` file and renames it over the ledger, so an
    /// interrupted rewrite leaves the previous contents in place.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), entries = entries.len()))]
    pub fn rewrite(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        self.create_parent()?;
        let tmp_path = self.tmp_path();
        let tmp_err = |source| LedgerError::Io {
            path: tmp_path.clone(),
            source,
        };

        let file = File::create(&tmp_path).map_err(tmp_err)?;
        let mut writer = csv_writer(file);
        writer
            .write_record(LEDGER_HEADER)
            .map_err(|e| self.csv_err(e))?;
        for entry in entries {
            match entry {
                LedgerEntry::Row(row) => writer
                    .write_record(row.as_record())
                    .map_err(|e| self.csv_err(e))?,
                LedgerEntry::Unparsed(raw) => {
                    writer.flush().map_err(tmp_err)?;
                    let mut inner = writer.get_ref();
                    inner.write_all(raw.as_bytes()).map_err(tmp_err)?;
                    inner.write_all(b"\n").map_err(tmp_err)?;
                }
            }
        }
        let file = writer
            .into_inner()
            .map_err(|e| tmp_err(e.into_error()))?;
        file.sync_all().map_err(tmp_err)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_err(e))?;
        info!("Rewrote ledger");
        Ok(())
    }

    fn load(&self) -> Result<Contents, LedgerError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Contents::Missing),
            Err(e) => return Err(self.io_err(e)),
        };
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes.as_slice());
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Contents::Empty);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(body);

        let headers = reader.headers().map_err(|e| self.csv_err(e))?.clone();
        if !headers.iter().eq(LEDGER_HEADER) {
            return Err(LedgerError::Header {
                path: self.path.clone(),
                expected: LEDGER_HEADER.join(","),
                found: headers.iter().collect::<Vec<_>>().join(","),
            });
        }

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| self.csv_err(e))?;
            let start = record.position().map_or(0, |pos| pos.byte() as usize);
            records.push((record, start));
        }

        let mut entries = Vec::with_capacity(records.len());
        for (index, (record, start)) in records.iter().enumerate() {
            match LedgerRow::from_record(record) {
                Some(row) => entries.push(LedgerEntry::Row(row)),
                None => {
                    // A record runs until the next one starts.
                    let end = records.get(index + 1).map_or(body.len(), |(_, next)| *next);
                    let raw = String::from_utf8_lossy(&body[*start..end])
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    warn!(
                        path = %self.path.display(),
                        row = index + 1,
                        fields = record.len(),
                        "Ledger row has the wrong column count; keeping it as-is"
                    );
                    entries.push(LedgerEntry::Unparsed(raw));
                }
            }
        }

        Ok(Contents::Rows {
            entries,
            ends_with_newline: body.last() == Some(&b'\n'),
        })
    }

    fn initialize(&self) -> Result<(), LedgerError> {
        self.create_parent()?;
        let file = File::create(&self.path).map_err(|e| self.io_err(e))?;
        let mut writer = csv_writer(file);
        writer
            .write_record(LEDGER_HEADER)
            .map_err(|e| self.csv_err(e))?;
        writer.flush().map_err(|e| self.io_err(e))?;
        info!(path = %self.path.display(), "Created ledger with header");
        Ok(())
    }

    fn create_parent(&self) -> Result<(), LedgerError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))
            }
            _ => Ok(()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> LedgerError {
        LedgerError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

fn csv_writer<W: Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(inner)
}
