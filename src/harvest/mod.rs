//! The shared harvest pipeline.
//!
//! Every source runs through the same driver, [`Harvester::run`]:
//!
//! 1. **Init**: load the URLs the ledger already holds for the source, plus
//!    the checked-URL memo when the source keeps one
//! 2. **Fetch / extract**: pull [`Candidate`]s from each listing URL
//! 3. **Filter**: drop known URLs, enrich from the article page when the
//!    source needs it, then drop undated, too-old and off-topic candidates
//! 4. **Append**: hand the survivors to [`Ledger::append`]
//!
//! What differs between sources lives behind the [`Source`] trait. Three
//! kinds implement it: [`html::HtmlSource`], [`feed::FeedSource`] and
//! [`wordpress::WordPressSource`]; [`AnySource`] picks one per catalog entry.

pub mod checked;
pub mod feed;
pub mod html;
pub mod wordpress;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{ConfigError, SourceConfig, SourceKind};
use crate::dates::{meets_cutoff, parse_datetime};
use crate::fetch::{Fetch, FetchError};
use crate::keywords::{KeywordMatch, Keywords};
use crate::ledger::{Ledger, LedgerError};
use crate::models::{ArticleRecord, Candidate};
use crate::utils::collapse_whitespace;
use checked::CheckedUrls;

/// Title written when neither the listing nor the article page has one.
pub const UNTITLED: &str = "Title not found";

/// A listing response that could not be turned into candidates.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed feed: {0}")]
    Feed(#[from] quick_xml::de::DeError),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognized document: {0}")]
    Unrecognized(String),
}

/// Errors that abort a whole source.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("checked-URL memo {}: {source}", .path.display())]
    Checked {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Filtering options shared by every source kind.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub id: String,
    pub keyword_filter: bool,
    pub keyword_match: KeywordMatch,
    pub min_year: Option<i32>,
    pub checked_file: Option<PathBuf>,
}

impl From<&SourceConfig> for SourceSettings {
    fn from(config: &SourceConfig) -> Self {
        Self {
            id: config.id.clone(),
            keyword_filter: config.keyword_filter,
            keyword_match: config.keyword_match,
            min_year: config.min_year,
            checked_file: config.checked_file.clone(),
        }
    }
}

/// Candidates gathered from a source's listings.
#[derive(Debug, Default)]
pub struct Listing {
    /// Listing responses fetched successfully.
    pub fetched: usize,
    /// Listing URLs that failed to fetch or parse.
    pub failed: usize,
    pub candidates: Vec<Candidate>,
}

/// A harvestable source.
pub trait Source {
    fn settings(&self) -> &SourceSettings;

    /// Value of the ledger `source` column.
    fn id(&self) -> &str {
        &self.settings().id
    }

    /// Pages, feeds or endpoints to fetch.
    fn listing_urls(&self) -> Vec<String>;

    /// Pull candidates out of one listing response.
    fn extract(&self, url: &str, body: &str) -> Result<Vec<Candidate>, ExtractError>;

    /// Whether [`Source::candidates`] wants the newest ledger date for this source.
    fn incremental(&self) -> bool {
        false
    }

    /// Fetch every listing URL and extract candidates, in order.
    ///
    /// A listing that fails to fetch or parse is logged and skipped; the rest
    /// are still processed. Relative candidate URLs are resolved against the
    /// listing URL.
    async fn candidates<F: Fetch>(&self, fetcher: &F, _since: Option<DateTime<Utc>>) -> Listing {
        let results: Vec<_> = stream::iter(self.listing_urls())
            .then(|url| async move {
                let result = match fetcher.get_text(&url).await {
                    Ok(body) => self.extract(&url, &body).map_err(ListingFailure::Extract),
                    Err(e) => Err(ListingFailure::Fetch(e)),
                };
                (url, result)
            })
            .collect()
            .await;

        let mut listing = Listing::default();
        for (url, result) in results {
            match result {
                Ok(candidates) => {
                    listing.fetched += 1;
                    let candidates = resolve_urls(&url, candidates);
                    debug!(%url, count = candidates.len(), "Extracted candidates");
                    listing.candidates.extend(candidates);
                }
                Err(e) => {
                    listing.failed += 1;
                    warn!(source = self.id(), %url, error = %e, "Listing yielded nothing");
                }
            }
        }
        listing
    }

    /// Whether candidates need a per-article fetch before filtering.
    fn enriches(&self) -> bool {
        false
    }

    /// Complete a candidate from its article page.
    async fn enrich<F: Fetch>(&self, candidate: Candidate, _fetcher: &F) -> Result<Candidate, FetchError> {
        Ok(candidate)
    }
}

#[derive(Debug, Error)]
enum ListingFailure {
    #[error(transparent)]
    Fetch(FetchError),
    #[error(transparent)]
    Extract(ExtractError),
}

/// Resolve candidate URLs against the listing they came from and drop the
/// ones that have no usable URL.
pub fn resolve_urls(listing_url: &str, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let base = Url::parse(listing_url).ok();
    candidates
        .into_iter()
        .filter_map(|mut candidate| {
            let raw = candidate.url.trim();
            if raw.is_empty() {
                return None;
            }
            let resolved = match &base {
                Some(base) => base.join(raw).ok()?.to_string(),
                None => Url::parse(raw).ok()?.to_string(),
            };
            candidate.url = resolved;
            Some(candidate)
        })
        .collect()
}

/// One configured source, of any kind.
#[derive(Debug)]
pub enum AnySource {
    Html(html::HtmlSource),
    Feed(feed::FeedSource),
    WordPress(wordpress::WordPressSource),
}

impl AnySource {
    /// Build a source from its catalog entry, compiling selectors and patterns.
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        Ok(match config.kind {
            SourceKind::Html => AnySource::Html(html::HtmlSource::from_config(config)?),
            SourceKind::Feed => AnySource::Feed(feed::FeedSource::from_config(config)),
            SourceKind::WordPress => AnySource::WordPress(wordpress::WordPressSource::from_config(config)),
        })
    }
}

impl Source for AnySource {
    fn settings(&self) -> &SourceSettings {
        match self {
            AnySource::Html(s) => s.settings(),
            AnySource::Feed(s) => s.settings(),
            AnySource::WordPress(s) => s.settings(),
        }
    }

    fn listing_urls(&self) -> Vec<String> {
        match self {
            AnySource::Html(s) => s.listing_urls(),
            AnySource::Feed(s) => s.listing_urls(),
            AnySource::WordPress(s) => s.listing_urls(),
        }
    }

    fn extract(&self, url: &str, body: &str) -> Result<Vec<Candidate>, ExtractError> {
        match self {
            AnySource::Html(s) => s.extract(url, body),
            AnySource::Feed(s) => s.extract(url, body),
            AnySource::WordPress(s) => s.extract(url, body),
        }
    }

    fn incremental(&self) -> bool {
        match self {
            AnySource::Html(s) => s.incremental(),
            AnySource::Feed(s) => s.incremental(),
            AnySource::WordPress(s) => s.incremental(),
        }
    }

    async fn candidates<F: Fetch>(&self, fetcher: &F, since: Option<DateTime<Utc>>) -> Listing {
        match self {
            AnySource::Html(s) => s.candidates(fetcher, since).await,
            AnySource::Feed(s) => s.candidates(fetcher, since).await,
            AnySource::WordPress(s) => s.candidates(fetcher, since).await,
        }
    }

    fn enriches(&self) -> bool {
        match self {
            AnySource::Html(s) => s.enriches(),
            AnySource::Feed(s) => s.enriches(),
            AnySource::WordPress(s) => s.enriches(),
        }
    }

    async fn enrich<F: Fetch>(&self, candidate: Candidate, fetcher: &F) -> Result<Candidate, FetchError> {
        match self {
            AnySource::Html(s) => s.enrich(candidate, fetcher).await,
            AnySource::Feed(s) => s.enrich(candidate, fetcher).await,
            AnySource::WordPress(s) => s.enrich(candidate, fetcher).await,
        }
    }
}

/// Counters for one source run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub source: String,
    /// Listing responses fetched.
    pub fetched: usize,
    /// Listing URLs that yielded nothing because of an error.
    pub failed_listings: usize,
    /// Candidates extracted across all listings.
    pub extracted: usize,
    /// Already in the ledger, seen earlier in this run, or in the checked memo.
    pub duplicates: usize,
    /// Per-article fetch failed.
    pub enrich_failed: usize,
    /// Missing or unparseable date.
    pub undated: usize,
    /// Published before the cutoff year.
    pub too_old: usize,
    /// No keyword matched.
    pub filtered_out: usize,
    /// Rows written to the ledger.
    pub appended: usize,
}

/// Runs sources against one ledger.
pub struct Harvester<'a, F> {
    ledger: &'a Ledger,
    fetcher: &'a F,
    min_year: i32,
    request_delay: Duration,
}

impl<'a, F: Fetch> Harvester<'a, F> {
    pub fn new(ledger: &'a Ledger, fetcher: &'a F, min_year: i32) -> Self {
        Self {
            ledger,
            fetcher,
            min_year,
            request_delay: Duration::ZERO,
        }
    }

    /// Pause between per-article fetches.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Harvest one source and append its new records.
    ///
    /// # Errors
    ///
    /// Ledger integrity and I/O problems abort the source before anything is
    /// written. Fetch and parse problems never do; they only shrink the result.
    #[instrument(level = "info", skip_all, fields(source = source.id()))]
    pub async fn run<S: Source>(&self, source: &S, keywords: &Keywords) -> Result<HarvestReport, HarvestError> {
        let settings = source.settings();
        let id = source.id();
        let mut report = HarvestReport {
            source: id.to_string(),
            ..HarvestReport::default()
        };

        // Init
        let mut seen = self.ledger.load_existing_urls(id)?;
        let mut checked = match &settings.checked_file {
            Some(path) => Some(CheckedUrls::load(path).map_err(|source| HarvestError::Checked {
                path: path.clone(),
                source,
            })?),
            None => None,
        };
        let since = if source.incremental() {
            self.ledger.latest_date(id)?
        } else {
            None
        };
        debug!(
            known = seen.len(),
            checked = checked.as_ref().map_or(0, CheckedUrls::len),
            ?since,
            "Loaded ledger state"
        );

        // Fetch and extract
        let listing = source.candidates(self.fetcher, since).await;
        report.fetched = listing.fetched;
        report.failed_listings = listing.failed;
        report.extracted = listing.candidates.len();

        // Filter
        let min_year = settings.min_year.unwrap_or(self.min_year);
        let keyword_filter = settings.keyword_filter && !keywords.is_empty();
        let mut enrich_count = 0usize;
        let mut records = Vec::new();

        for candidate in listing.candidates {
            let previously_checked = checked.as_ref().is_some_and(|memo| memo.contains(&candidate.url));
            if previously_checked || !seen.insert(candidate.url.clone()) {
                report.duplicates += 1;
                continue;
            }

            let candidate = if source.enriches() {
                if enrich_count > 0 && !self.request_delay.is_zero() {
                    tokio::time::sleep(self.request_delay).await;
                }
                enrich_count += 1;
                match source.enrich(candidate, self.fetcher).await {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        warn!(error = %e, "Article fetch failed; dropping candidate");
                        report.enrich_failed += 1;
                        continue;
                    }
                }
            } else {
                candidate
            };

            let date = match candidate.date_text.as_deref().map(parse_datetime) {
                Some(Ok(date)) => date,
                Some(Err(e)) => {
                    warn!(url = %candidate.url, error = %e, "Dropping candidate with unparseable date");
                    report.undated += 1;
                    continue;
                }
                None => {
                    warn!(url = %candidate.url, "Dropping candidate without a date");
                    report.undated += 1;
                    continue;
                }
            };

            if !meets_cutoff(&date, min_year) {
                debug!(url = %candidate.url, %date, min_year, "Older than cutoff");
                report.too_old += 1;
                continue;
            }

            if keyword_filter {
                let matched = keywords.matches(&candidate.searchable_text(), settings.keyword_match);
                if matched.is_empty() {
                    debug!(url = %candidate.url, "No keyword match");
                    report.filtered_out += 1;
                    if let Some(memo) = checked.as_mut() {
                        memo.record(&candidate.url).map_err(|source| HarvestError::Checked {
                            path: memo.path().to_path_buf(),
                            source,
                        })?;
                    }
                    continue;
                }
                debug!(url = %candidate.url, keywords = ?matched, "Keyword match");
            }

            let title = candidate
                .title
                .as_deref()
                .map(collapse_whitespace)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string());
            records.push(ArticleRecord::new(date, id, candidate.url, title));
        }

        // Append
        report.appended = self.ledger.append(records)?;

        info!(
            fetched = report.fetched,
            failed_listings = report.failed_listings,
            extracted = report.extracted,
            duplicates = report.duplicates,
            undated = report.undated,
            too_old = report.too_old,
            filtered_out = report.filtered_out,
            appended = report.appended,
            "Harvest complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;
    use std::fs;

    const LISTING: &str = "https://stub.test/news/";

    /// Serves a fixed candidate list for every listing URL. With `article_dates`
    /// on, each article page body is used as the candidate's date text.
    struct StubSource {
        settings: SourceSettings,
        listings: Vec<String>,
        items: Vec<Candidate>,
        article_dates: bool,
    }

    impl StubSource {
        fn new(items: Vec<Candidate>) -> Self {
            Self {
                settings: SourceSettings {
                    id: "stub.test".to_string(),
                    keyword_filter: false,
                    keyword_match: KeywordMatch::default(),
                    min_year: None,
                    checked_file: None,
                },
                listings: vec![LISTING.to_string()],
                items,
                article_dates: false,
            }
        }
    }

    impl Source for StubSource {
        fn settings(&self) -> &SourceSettings {
            &self.settings
        }

        fn listing_urls(&self) -> Vec<String> {
            self.listings.clone()
        }

        fn extract(&self, _url: &str, _body: &str) -> Result<Vec<Candidate>, ExtractError> {
            Ok(self.items.clone())
        }

        fn enriches(&self) -> bool {
            self.article_dates
        }

        async fn enrich<F: Fetch>(&self, mut candidate: Candidate, fetcher: &F) -> Result<Candidate, FetchError> {
            candidate.date_text = Some(fetcher.get_text(&candidate.url).await?);
            Ok(candidate)
        }
    }

    fn item(path: &str, title: &str, date: &str) -> Candidate {
        Candidate::new(format!("https://stub.test/{path}"))
            .with_title(title)
            .with_date(date)
    }

    fn setup() -> (tempfile::TempDir, Ledger, StaticFetcher) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("articles.csv"));
        let fetcher = StaticFetcher::new().with_page(LISTING, "<html></html>");
        (dir, ledger, fetcher)
    }

    fn data_lines(ledger: &Ledger) -> Vec<String> {
        fs::read_to_string(ledger.path())
            .unwrap()
            .lines()
            .skip(1)
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_new_items_are_appended_in_date_order() {
        let (_dir, ledger, fetcher) = setup();
        let source = StubSource::new(vec![
            item("b", "B", "2025-05-02T00:00:00Z"),
            item("a", "A", "2025-05-01T00:00:00Z"),
            item("c", "C", "2025-05-03T00:00:00Z"),
        ]);

        let report = Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap();

        assert_eq!(report.extracted, 3);
        assert_eq!(report.appended, 3);
        assert_eq!(
            data_lines(&ledger),
            vec![
                "2025-05-01T00:00:00+00:00,stub.test,https://stub.test/a,A,",
                "2025-05-02T00:00:00+00:00,stub.test,https://stub.test/b,B,",
                "2025-05-03T00:00:00+00:00,stub.test,https://stub.test/c,C,",
            ]
        );
    }

    #[tokio::test]
    async fn test_known_url_is_skipped() {
        let (_dir, ledger, fetcher) = setup();
        let existing = item("x", "X", "2025-03-01T00:00:00Z");
        ledger
            .append(vec![ArticleRecord::new(
                parse_datetime("2025-03-01T00:00:00Z").unwrap(),
                "stub.test",
                existing.url.clone(),
                "X",
            )])
            .unwrap();

        let source = StubSource::new(vec![existing, item("y", "Y", "2025-03-02T00:00:00Z")]);
        let report = Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap();

        assert_eq!(report.duplicates, 1);
        assert_eq!(report.appended, 1);
        let lines = data_lines(&ledger);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("https://stub.test/y"));
    }

    #[tokio::test]
    async fn test_items_before_cutoff_year_are_dropped() {
        let (_dir, ledger, fetcher) = setup();
        let source = StubSource::new(vec![
            item("old", "Old", "2024-12-31T23:59:59Z"),
            item("new", "New", "2025-01-01T00:00:00Z"),
        ]);

        let report = Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap();

        assert_eq!(report.too_old, 1);
        assert_eq!(report.appended, 1);
        assert!(!data_lines(&ledger).iter().any(|l| l.starts_with("2024")));
    }

    #[tokio::test]
    async fn test_source_min_year_overrides_global() {
        let (_dir, ledger, fetcher) = setup();
        let mut source = StubSource::new(vec![item("old", "Old", "2024-06-01")]);
        source.settings.min_year = Some(2024);

        let report = Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap();
        assert_eq!(report.appended, 1);
    }

    #[tokio::test]
    async fn test_rerun_appends_nothing() {
        let (_dir, ledger, fetcher) = setup();
        let source = StubSource::new(vec![
            item("a", "A", "2025-05-01T00:00:00Z"),
            item("b", "B", "2025-05-02T00:00:00Z"),
        ]);
        let harvester = Harvester::new(&ledger, &fetcher, 2025);

        harvester.run(&source, &Keywords::default()).await.unwrap();
        let before = fs::read(ledger.path()).unwrap();

        let report = harvester.run(&source, &Keywords::default()).await.unwrap();
        assert_eq!(report.appended, 0);
        assert_eq!(report.duplicates, 2);
        assert_eq!(fs::read(ledger.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_undated_items_are_dropped_not_stamped_now() {
        let (_dir, ledger, fetcher) = setup();
        let source = StubSource::new(vec![
            Candidate::new("https://stub.test/nodate").with_title("No date"),
            item("garbled", "Garbled", "sometime last week"),
            item("ok", "Fine", "8 May 2025"),
        ]);

        let report = Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap();

        assert_eq!(report.undated, 2);
        assert_eq!(data_lines(&ledger), vec!["2025-05-08T00:00:00+00:00,stub.test,https://stub.test/ok,Fine,"]);
    }

    #[tokio::test]
    async fn test_repeated_url_within_run_is_appended_once() {
        let (_dir, ledger, fetcher) = setup();
        let mut source = StubSource::new(vec![item("a", "A", "2025-05-01")]);
        source.listings.push(LISTING.to_string());

        let report = Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.appended, 1);
    }

    #[tokio::test]
    async fn test_failed_listing_does_not_stop_others() {
        let (_dir, ledger, fetcher) = setup();
        let mut source = StubSource::new(vec![item("a", "A", "2025-05-01")]);
        source.listings.insert(0, "https://stub.test/missing".to_string());

        let report = Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap();

        assert_eq!(report.failed_listings, 1);
        assert_eq!(report.fetched, 1);
        assert_eq!(report.appended, 1);
    }

    #[tokio::test]
    async fn test_keyword_filter_records_rejections() {
        let (dir, ledger, fetcher) = setup();
        let memo_path = dir.path().join("stub_checked.txt");
        let mut source = StubSource::new(vec![
            item("hit", "ASIC bans crypto lender", "2025-05-01"),
            item("miss", "Quarterly enforcement report", "2025-05-02"),
        ]);
        source.settings.keyword_filter = true;
        source.settings.checked_file = Some(memo_path.clone());
        let keywords = Keywords::new(["crypto"]);
        let harvester = Harvester::new(&ledger, &fetcher, 2025);

        let report = harvester.run(&source, &keywords).await.unwrap();
        assert_eq!(report.filtered_out, 1);
        assert_eq!(report.appended, 1);
        assert_eq!(fs::read_to_string(&memo_path).unwrap(), "https://stub.test/miss\n");

        let report = harvester.run(&source, &keywords).await.unwrap();
        assert_eq!(report.duplicates, 2);
        assert_eq!(report.filtered_out, 0);
    }

    #[tokio::test]
    async fn test_empty_keyword_list_disables_filter() {
        let (_dir, ledger, fetcher) = setup();
        let mut source = StubSource::new(vec![item("a", "Unrelated", "2025-05-01")]);
        source.settings.keyword_filter = true;

        let report = Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap();
        assert_eq!(report.appended, 1);
    }

    #[tokio::test]
    async fn test_enrich_fills_date_and_failures_drop() {
        let (_dir, ledger, fetcher) = setup();
        let fetcher = fetcher.with_page("https://stub.test/a", "14 May 2025");
        let mut source = StubSource::new(vec![
            Candidate::new("https://stub.test/a").with_title("A"),
            Candidate::new("https://stub.test/gone").with_title("Gone"),
        ]);
        source.article_dates = true;

        let report = Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap();

        assert_eq!(report.enrich_failed, 1);
        assert_eq!(report.appended, 1);
        assert_eq!(
            fetcher.requested(),
            vec![LISTING, "https://stub.test/a", "https://stub.test/gone"]
        );
    }

    #[tokio::test]
    async fn test_missing_title_gets_placeholder() {
        let (_dir, ledger, fetcher) = setup();
        let source = StubSource::new(vec![Candidate::new("https://stub.test/a").with_date("2025-05-01")]);

        Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap();
        assert_eq!(
            data_lines(&ledger),
            vec!["2025-05-01T00:00:00+00:00,stub.test,https://stub.test/a,Title not found,"]
        );
    }

    #[tokio::test]
    async fn test_malformed_ledger_aborts_source() {
        let (_dir, ledger, fetcher) = setup();
        fs::write(ledger.path(), "when,where,what\n").unwrap();
        let source = StubSource::new(vec![item("a", "A", "2025-05-01")]);

        let err = Harvester::new(&ledger, &fetcher, 2025)
            .run(&source, &Keywords::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Ledger(LedgerError::Header { .. })));
        assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "when,where,what\n");
        assert!(fetcher.requested().is_empty());
    }

    #[test]
    fn test_resolve_urls() {
        let resolved = resolve_urls(
            "https://asic.gov.au/newsroom/media-releases/",
            vec![
                Candidate::new("/about/news/25-100mr-title/"),
                Candidate::new("https://elsewhere.test/x"),
                Candidate::new("   "),
            ],
        );
        let urls: Vec<_> = resolved.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://asic.gov.au/about/news/25-100mr-title/", "https://elsewhere.test/x"]
        );
    }
}
