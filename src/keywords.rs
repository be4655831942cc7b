//! Keyword list loading and matching.
//!
//! The keyword file is newline-delimited. Lines are trimmed, lowercased and
//! de-duplicated; blank lines are ignored. A missing file disables keyword
//! filtering rather than failing the run.

use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

/// How a keyword must appear in the text to count as a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordMatch {
    /// Whole-word, case-insensitive (`ASIC` matches `asic`, not `basic`).
    #[default]
    Word,
    /// Plain case-insensitive substring.
    Substring,
}

/// A normalized keyword list with precompiled whole-word patterns.
#[derive(Debug, Clone, Default)]
pub struct Keywords {
    terms: Vec<String>,
    patterns: Vec<Option<Regex>>,
}

impl Keywords {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .unique()
            .collect();

        let patterns = terms
            .iter()
            .map(|term| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
                match Regex::new(&pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(%term, error = %e, "Keyword does not compile as a pattern; it will never match");
                        None
                    }
                }
            })
            .collect();

        Self { terms, patterns }
    }

    /// Parse the contents of a keyword file. A leading BOM is ignored.
    pub fn parse(contents: &str) -> Self {
        Self::new(contents.trim_start_matches('\u{feff}').lines())
    }

    /// Load a keyword file.
    ///
    /// A missing or unreadable file is logged and yields an empty list, which
    /// turns keyword filtering off.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Self {
        match fs::read_to_string(path).await {
            Ok(contents) => {
                let keywords = Self::parse(&contents);
                info!(count = keywords.len(), "Loaded keywords");
                keywords
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Keyword file not found; keyword filtering disabled");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "Could not read keyword file; keyword filtering disabled");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Every keyword found in `text`, in list order.
    pub fn matches<'a>(&'a self, text: &str, mode: KeywordMatch) -> Vec<&'a str> {
        match mode {
            KeywordMatch::Word => self
                .terms
                .iter()
                .zip(&self.patterns)
                .filter(|(_, re)| re.as_ref().is_some_and(|re| re.is_match(text)))
                .map(|(term, _)| term.as_str())
                .collect(),
            KeywordMatch::Substring => {
                let lowered = text.to_lowercase();
                self.terms
                    .iter()
                    .filter(|term| lowered.contains(term.as_str()))
                    .map(String::as_str)
                    .collect()
            }
        }
    }
}
