//! Runtime configuration.
//!
//! Settings come from an optional YAML file. Every field has a default, and
//! when the file omits `sources` the built-in catalog is used, so the binary
//! runs with no file at all. CLI flags override a handful of fields after
//! loading (see [`crate::cli`]).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument};

use crate::keywords::KeywordMatch;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("source {source_id}: invalid selector {selector:?}: {message}")]
    Selector {
        source_id: String,
        selector: String,
        message: String,
    },

    #[error("source {source_id}: invalid link pattern: {error}")]
    Pattern {
        source_id: String,
        #[source]
        error: regex::Error,
    },

    #[error("unknown source {id:?}; known sources: {}", .known.join(", "))]
    UnknownSource { id: String, known: Vec<String> },
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the shared CSV ledger.
    pub ledger: PathBuf,
    /// Newline-delimited keyword list used by keyword-filtered sources.
    pub keywords_file: PathBuf,
    /// Records published before this year are discarded.
    pub min_year: i32,
    pub request_timeout_secs: u64,
    /// Pause between per-article fetches.
    pub request_delay_ms: u64,
    pub user_agent: String,
    pub sources: Vec<SourceConfig>,
    pub notifier: NotifierConfig,
    pub publisher: PublisherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: PathBuf::from("articles.csv"),
            keywords_file: PathBuf::from("web3keywords.txt"),
            min_year: 2025,
            request_timeout_secs: 30,
            request_delay_ms: 1500,
            user_agent: format!(
                "ozcryptonews/{} (+https://github.com/konashevich/ozcryptonews)",
                env!("CARGO_PKG_VERSION")
            ),
            sources: builtin_sources(),
            notifier: NotifierConfig::default(),
            publisher: PublisherConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration from `path`, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or if [`Config::validate`]
    /// rejects it.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config = Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!(sources = config.sources.len(), "Loaded configuration file");
                config
            }
            None => {
                info!("No config file given; using built-in defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Structural checks that do not need to compile selectors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no sources configured".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".into(),
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(ConfigError::Invalid("source with an empty id".into()));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source id {:?}",
                    source.id
                )));
            }
            if source.urls.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source {:?} has no urls",
                    source.id
                )));
            }
            match source.kind {
                SourceKind::Html if source.selectors.is_none() => {
                    return Err(ConfigError::Invalid(format!(
                        "html source {:?} needs listing selectors",
                        source.id
                    )));
                }
                SourceKind::WordPress if !(1..=100).contains(&source.per_page) => {
                    return Err(ConfigError::Invalid(format!(
                        "wordpress source {:?}: per_page must be between 1 and 100",
                        source.id
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Resolve the sources to run. An empty `ids` selects every source.
    pub fn select_sources(&self, ids: &[String]) -> Result<Vec<&SourceConfig>, ConfigError> {
        if ids.is_empty() {
            return Ok(self.sources.iter().collect());
        }
        ids.iter()
            .map(|id| {
                self.sources
                    .iter()
                    .find(|s| &s.id == id)
                    .ok_or_else(|| ConfigError::UnknownSource {
                        id: id.clone(),
                        known: self.sources.iter().map(|s| s.id.clone()).collect(),
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// HTML listing pages scraped with CSS selectors.
    Html,
    /// RSS 2.0 or Atom feed.
    Feed,
    /// WordPress REST API (`/wp-json/wp/v2/posts`).
    WordPress,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Html => "html",
            SourceKind::Feed => "feed",
            SourceKind::WordPress => "wordpress",
        }
    }
}

/// One entry of the source catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Value written to the ledger `source` column.
    pub id: String,
    pub kind: SourceKind,
    /// Listing pages, feeds or API endpoints. HTML URLs may contain `{keyword}`.
    pub urls: Vec<String>,
    #[serde(default)]
    pub keyword_filter: bool,
    #[serde(default)]
    pub keyword_match: KeywordMatch,
    /// Overrides the global keyword list for this source.
    #[serde(default)]
    pub keywords_file: Option<PathBuf>,
    /// Overrides the global cutoff year.
    #[serde(default)]
    pub min_year: Option<i32>,
    /// Memo of URLs already inspected and rejected by the keyword filter.
    #[serde(default)]
    pub checked_file: Option<PathBuf>,
    #[serde(default)]
    pub selectors: Option<ListingSelectors>,
    #[serde(default)]
    pub article: Option<ArticleSelectors>,
    /// Only links whose absolute URL matches this regex are kept.
    #[serde(default)]
    pub link_pattern: Option<String>,
    /// Terms substituted for `{keyword}` in listing URLs.
    #[serde(default = "default_search_terms")]
    pub search_terms: Vec<String>,
    /// Keep at most this many candidates per listing page.
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl SourceConfig {
    fn new(id: &str, kind: SourceKind, urls: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            kind,
            urls: urls.iter().map(|u| u.to_string()).collect(),
            keyword_filter: false,
            keyword_match: KeywordMatch::default(),
            keywords_file: None,
            min_year: None,
            checked_file: None,
            selectors: None,
            article: None,
            link_pattern: None,
            search_terms: default_search_terms(),
            max_items: None,
            per_page: default_per_page(),
            max_pages: default_max_pages(),
        }
    }

    fn keyword_filtered(mut self, mode: KeywordMatch) -> Self {
        self.keyword_filter = true;
        self.keyword_match = mode;
        self
    }
}

/// Selectors applied to a listing page.
///
/// With an `item` selector, every other selector is scoped to each matched
/// container. Without one, titles, dates and summaries are selected across
/// the whole page and paired by position with each `heading` match (the link
/// is looked up inside the heading), or with each `link` match when there is
/// no heading selector. Slots whose link is missing or rejected are dropped
/// after pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSelectors {
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default = "default_link_selector")]
    pub link: String,
    /// Keep only links whose text equals this, ignoring case.
    #[serde(default)]
    pub link_text: Option<String>,
    /// Defaults to the link text.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// Attribute holding the date (e.g. `datetime`); element text otherwise.
    #[serde(default)]
    pub date_attr: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl ListingSelectors {
    fn new(item: Option<&str>, link: &str) -> Self {
        Self {
            item: item.map(str::to_string),
            heading: None,
            link: link.to_string(),
            link_text: None,
            title: None,
            date: None,
            date_attr: None,
            summary: None,
        }
    }

    fn title(mut self, selector: &str) -> Self {
        self.title = Some(selector.to_string());
        self
    }

    fn date(mut self, selector: &str, attr: Option<&str>) -> Self {
        self.date = Some(selector.to_string());
        self.date_attr = attr.map(str::to_string);
        self
    }
}

/// Selectors applied to an individual article page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleSelectors {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub date_attr: Option<String>,
    /// Body text for keyword matching; the whole page when the selector misses.
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Pause between delivery attempts.
    pub delay_ms: u64,
    pub telegram: TelegramConfig,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            delay_ms: 3000,
            telegram: TelegramConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub remote: String,
    pub branch: String,
    pub message: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            remote: "https://github.com/konashevich/ozcryptonews.git".to_string(),
            branch: "main".to_string(),
            message: "Update articles.csv".to_string(),
        }
    }
}

fn default_search_terms() -> Vec<String> {
    vec!["australia".to_string()]
}

fn default_per_page() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    10
}

fn default_link_selector() -> String {
    "a[href]".to_string()
}

/// The sources harvested when the config file does not list any.
pub fn builtin_sources() -> Vec<SourceConfig> {
    let austrac = SourceConfig::new(
        "austrac.gov.au",
        SourceKind::Feed,
        &["https://www.austrac.gov.au/media-release/rss.xml"],
    )
    .keyword_filtered(KeywordMatch::Word);

    let web3au = SourceConfig::new("web3au.media", SourceKind::Feed, &["https://www.web3au.media/feed"]);

    let defi = SourceConfig::new(
        "australiandefiassociation.substack.com",
        SourceKind::Feed,
        &["https://australiandefiassociation.substack.com/feed"],
    );

    let ausblock = SourceConfig::new(
        "ausblock.com.au",
        SourceKind::WordPress,
        &["https://ausblock.com.au/wp-json/wp/v2/posts"],
    );

    let mut cryptonews = SourceConfig::new(
        "cryptonews.com.au",
        SourceKind::Html,
        &[
            "https://cryptonews.com.au/category/australia/",
            "https://cryptonews.com.au/category/austrac/",
            "https://cryptonews.com.au/category/asic/",
        ],
    );
    cryptonews.selectors = Some(
        ListingSelectors::new(Some("div.article"), "div.post-info h4 a[href]")
            .date("div.meta div.date", None),
    );

    let mut regtech = SourceConfig::new("regtechglobal.org", SourceKind::Html, &["https://regtechglobal.org/news"])
        .keyword_filtered(KeywordMatch::Substring);
    regtech.keywords_file = Some(PathBuf::from("australia_keywords.txt"));
    regtech.selectors = Some(
        ListingSelectors {
            heading: Some("h4".to_string()),
            ..ListingSelectors::new(None, "a[href]")
        }
        .date("h5", None),
    );
    regtech.article = Some(ArticleSelectors {
        body: Some("div.entry-content, article".to_string()),
        ..ArticleSelectors::default()
    });

    let mut asic = SourceConfig::new(
        "asic.gov.au",
        SourceKind::Html,
        &["https://asic.gov.au/newsroom/media-releases/"],
    )
    .keyword_filtered(KeywordMatch::Word);
    asic.min_year = Some(2024);
    asic.checked_file = Some(PathBuf::from("asic_checked.txt"));
    asic.link_pattern = Some(r"/(\d{2})-\d{3}mr".to_string());
    asic.selectors = Some(ListingSelectors::new(None, "a[href]"));
    asic.article = Some(ArticleSelectors {
        title: Some("header.media-release h1".to_string()),
        date: Some("header.media-release time.nh-mr-date".to_string()),
        date_attr: None,
        body: Some("main, article".to_string()),
    });

    let mut cointelegraph = SourceConfig::new(
        "cointelegraph.com",
        SourceKind::Html,
        &["https://cointelegraph.com/tags/australia"],
    );
    cointelegraph.selectors = Some(
        ListingSelectors::new(Some("article.post-card-inline"), "a.post-card-inline__title-link[href]")
            .title("span.post-card-inline__title")
            .date("time.post-card-inline__date[datetime]", Some("datetime")),
    );

    let mut coindesk = SourceConfig::new(
        "coindesk.com",
        SourceKind::Html,
        &["https://www.coindesk.com/tag/australia"],
    );
    coindesk.selectors = Some(
        ListingSelectors::new(
            Some("div.bg-white.flex.gap-6.w-full.shrink.justify-between"),
            r#"a[class*="text-color-charcoal-900"][href]"#,
        )
        .title("h2")
        .date("span.font-metadata.text-color-charcoal-600", None),
    );

    let mut decrypt = SourceConfig::new(
        "decrypt.co",
        SourceKind::Html,
        &["https://decrypt.co/search/all/{keyword}"],
    );
    decrypt.link_pattern = Some(r"^https://decrypt\.co/(?:[^/]+/)*\d+/".to_string());
    decrypt.selectors = Some(
        ListingSelectors::new(Some("article"), "a[href]:not(.linkbox__overlay)").date("time", Some("datetime")),
    );

    let mut fintech = SourceConfig::new(
        "australianfintech.com.au",
        SourceKind::Html,
        &["https://australianfintech.com.au/newsfeed-page/"],
    );
    fintech.max_items = Some(10);
    fintech.selectors = Some(ListingSelectors {
        link_text: Some("Read more".to_string()),
        ..ListingSelectors::new(None, "a[href]")
    });
    fintech.article = Some(ArticleSelectors {
        title: Some("h1, h2".to_string()),
        date: Some("time".to_string()),
        date_attr: Some("datetime".to_string()),
        body: None,
    });

    vec![
        austrac,
        web3au,
        defi,
        ausblock,
        cryptonews,
        regtech,
        asic,
        cointelegraph,
        coindesk,
        decrypt,
        fintech,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ledger, PathBuf::from("articles.csv"));
        assert_eq!(config.min_year, 2025);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.notifier.delay_ms, 3000);
        assert_eq!(config.publisher.branch, "main");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builtin_catalog_ids_are_unique() {
        let sources = builtin_sources();
        let ids: HashSet<_> = sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), sources.len());
        assert!(ids.contains("asic.gov.au"));
        assert!(ids.contains("decrypt.co"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("ledger: data/feed.csv\nmin_year: 2026\n").unwrap();
        assert_eq!(config.ledger, PathBuf::from("data/feed.csv"));
        assert_eq!(config.min_year, 2026);
        assert_eq!(config.request_delay_ms, 1500);
        assert_eq!(config.sources.len(), builtin_sources().len());
    }

    #[test]
    fn test_source_yaml() {
        let yaml = r#"
sources:
  - id: example.com
    kind: html
    urls: ["https://example.com/news"]
    keyword_filter: true
    keyword_match: substring
    selectors:
      item: "li.story"
      date: "time"
      date_attr: datetime
  - id: example.org
    kind: wordpress
    urls: ["https://example.org/wp-json/wp/v2/posts"]
    per_page: 20
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.sources.len(), 2);

        let html = &config.sources[0];
        assert_eq!(html.kind, SourceKind::Html);
        assert_eq!(html.keyword_match, KeywordMatch::Substring);
        let selectors = html.selectors.as_ref().unwrap();
        assert_eq!(selectors.link, "a[href]");
        assert_eq!(selectors.date_attr.as_deref(), Some("datetime"));
        assert_eq!(html.search_terms, vec!["australia"]);

        let wp = &config.sources[1];
        assert_eq!(wp.kind, SourceKind::WordPress);
        assert_eq!(wp.per_page, 20);
        assert_eq!(wp.max_pages, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_missing_selectors() {
        let mut config = Config::default();
        let first = config.sources[0].clone();
        config.sources.push(first);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.sources = vec![SourceConfig::new("x", SourceKind::Html, &["https://x/"])];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_select_sources() {
        let config = Config::default();
        assert_eq!(config.select_sources(&[]).unwrap().len(), config.sources.len());

        let picked = config.select_sources(&["asic.gov.au".to_string()]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "asic.gov.au");

        let err = config.select_sources(&["nope".to_string()]).unwrap_err();
        assert!(err.to_string().contains("asic.gov.au"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "request_delay_ms: 0\nnotifier:\n  delay_ms: 10\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.request_delay_ms, 0);
        assert_eq!(config.notifier.delay_ms, 10);
        assert!(config.notifier.telegram.bot_token.is_none());
    }
}
