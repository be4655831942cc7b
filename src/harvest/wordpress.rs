//! WordPress REST API (`/wp-json/wp/v2/posts`).
//!
//! Posts are requested newest first, a page at a time, until a short page,
//! an error, or the page cap. When the ledger already holds posts from this
//! source, only posts after the newest one are requested.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{resolve_urls, ExtractError, Listing, Source, SourceSettings};
use crate::config::SourceConfig;
use crate::dates::LEDGER_DATE_FORMAT;
use crate::fetch::Fetch;
use crate::models::Candidate;
use crate::utils::html_to_text;

#[derive(Debug)]
pub struct WordPressSource {
    settings: SourceSettings,
    endpoints: Vec<String>,
    per_page: u32,
    max_pages: u32,
}

impl WordPressSource {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            settings: SourceSettings::from(config),
            endpoints: config.urls.clone(),
            per_page: config.per_page,
            max_pages: config.max_pages.max(1),
        }
    }

    /// URL of one page of posts, optionally restricted to posts after `since`.
    pub fn page_url(&self, endpoint: &str, page: u32, since: Option<DateTime<Utc>>) -> Option<String> {
        let mut url = Url::parse(endpoint).ok()?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("per_page", &self.per_page.to_string())
                .append_pair("page", &page.to_string())
                .append_pair("orderby", "date")
                .append_pair("order", "desc");
            if let Some(since) = since {
                query.append_pair("after", &since.format(LEDGER_DATE_FORMAT).to_string());
            }
        }
        Some(url.to_string())
    }
}

impl Source for WordPressSource {
    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn listing_urls(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .filter_map(|endpoint| self.page_url(endpoint, 1, None))
            .collect()
    }

    fn extract(&self, url: &str, body: &str) -> Result<Vec<Candidate>, ExtractError> {
        let posts: Vec<WpPost> = serde_json::from_str(body)?;
        let candidates: Vec<Candidate> = posts.into_iter().filter_map(WpPost::into_candidate).collect();
        debug!(source = %self.settings.id, %url, count = candidates.len(), "Parsed posts page");
        Ok(candidates)
    }

    fn incremental(&self) -> bool {
        true
    }

    #[instrument(level = "info", skip_all, fields(source = %self.settings.id))]
    async fn candidates<F: Fetch>(&self, fetcher: &F, since: Option<DateTime<Utc>>) -> Listing {
        let mut listing = Listing::default();

        for endpoint in &self.endpoints {
            let Some(first) = self.page_url(endpoint, 1, since) else {
                warn!(%endpoint, "Invalid endpoint URL");
                listing.failed += 1;
                continue;
            };

            for page in 1..=self.max_pages {
                let url = match page {
                    1 => first.clone(),
                    _ => match self.page_url(endpoint, page, since) {
                        Some(url) => url,
                        None => break,
                    },
                };

                let body = match fetcher.get_text(&url).await {
                    Ok(body) => body,
                    Err(e) => {
                        // WordPress answers 400 past the last page, so only a
                        // failure on the first page counts.
                        if page == 1 {
                            warn!(%url, error = %e, "Posts request failed");
                            listing.failed += 1;
                        } else {
                            debug!(%url, error = %e, "Stopping pagination");
                        }
                        break;
                    }
                };

                let posts = match self.extract(&url, &body) {
                    Ok(posts) => posts,
                    Err(e) => {
                        warn!(%url, error = %e, "Posts page could not be parsed");
                        listing.failed += 1;
                        break;
                    }
                };
                listing.fetched += 1;

                let count = posts.len();
                listing.candidates.extend(resolve_urls(&url, posts));
                if count < self.per_page as usize {
                    break;
                }
            }
        }

        info!(count = listing.candidates.len(), ?since, "Collected posts");
        listing
    }
}

#[derive(Debug, Deserialize)]
struct WpPost {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    date_gmt: Option<String>,
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: Rendered,
    #[serde(default)]
    excerpt: Rendered,
}

#[derive(Debug, Default, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

impl WpPost {
    fn into_candidate(self) -> Option<Candidate> {
        if self.link.trim().is_empty() {
            return None;
        }
        // `date_gmt` is UTC without an offset; `date` is site-local time.
        let date_text = self
            .date_gmt
            .filter(|d| !d.trim().is_empty())
            .or(self.date);
        Some(Candidate {
            url: self.link,
            title: Some(html_to_text(&self.title.rendered)),
            date_text,
            body: Some(html_to_text(&self.excerpt.rendered)).filter(|b| !b.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_sources;
    use crate::fetch::testing::StaticFetcher;
    use chrono::TimeZone;

    const ENDPOINT: &str = "https://ausblock.com.au/wp-json/wp/v2/posts";

    fn source(per_page: u32, max_pages: u32) -> WordPressSource {
        let mut config = builtin_sources().into_iter().find(|s| s.id == "ausblock.com.au").unwrap();
        config.per_page = per_page;
        config.max_pages = max_pages;
        WordPressSource::from_config(&config)
    }

    fn post(n: u32) -> String {
        format!(
            r#"{{"date":"2025-05-{n:02}T13:00:00","date_gmt":"2025-05-{n:02}T03:00:00","link":"https://ausblock.com.au/post-{n}/","title":{{"rendered":"Post {n} &#8211; news"}},"excerpt":{{"rendered":"<p>Excerpt {n}</p>\n"}}}}"#
        )
    }

    fn page(posts: &[u32]) -> String {
        format!("[{}]", posts.iter().map(|n| post(*n)).collect::<Vec<_>>().join(","))
    }

    #[test]
    fn test_page_url() {
        let source = source(2, 3);
        assert_eq!(
            source.page_url(ENDPOINT, 1, None).unwrap(),
            "https://ausblock.com.au/wp-json/wp/v2/posts?per_page=2&page=1&orderby=date&order=desc"
        );
        let since = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        assert!(
            source
                .page_url(ENDPOINT, 2, Some(since))
                .unwrap()
                .ends_with("page=2&orderby=date&order=desc&after=2025-05-01T00%3A00%3A00%2B00%3A00")
        );
    }

    #[test]
    fn test_extract_posts() {
        let source = source(100, 1);
        let candidates = source.extract(ENDPOINT, &page(&[3])).unwrap();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.url, "https://ausblock.com.au/post-3/");
        assert_eq!(c.title.as_deref(), Some("Post 3 \u{2013} news"));
        assert_eq!(c.date_text.as_deref(), Some("2025-05-03T03:00:00"));
        assert_eq!(c.body.as_deref(), Some("Excerpt 3"));
    }

    #[test]
    fn test_falls_back_to_local_date() {
        let source = source(100, 1);
        let body = r#"[{"date":"2025-05-03T13:00:00","link":"https://ausblock.com.au/x/","title":{"rendered":"X"}}]"#;
        let candidates = source.extract(ENDPOINT, body).unwrap();
        assert_eq!(candidates[0].date_text.as_deref(), Some("2025-05-03T13:00:00"));
    }

    #[tokio::test]
    async fn test_paginates_until_short_page() {
        let source = source(2, 5);
        let fetcher = StaticFetcher::new()
            .with_page(&source.page_url(ENDPOINT, 1, None).unwrap(), &page(&[5, 4]))
            .with_page(&source.page_url(ENDPOINT, 2, None).unwrap(), &page(&[3, 2]))
            .with_page(&source.page_url(ENDPOINT, 3, None).unwrap(), &page(&[1]));

        let listing = source.candidates(&fetcher, None).await;
        assert_eq!(listing.fetched, 3);
        assert_eq!(listing.failed, 0);
        assert_eq!(listing.candidates.len(), 5);
        assert_eq!(fetcher.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_stops_at_page_cap_and_on_missing_page() {
        let source = source(1, 2);
        let fetcher = StaticFetcher::new()
            .with_page(&source.page_url(ENDPOINT, 1, None).unwrap(), &page(&[5]))
            .with_page(&source.page_url(ENDPOINT, 2, None).unwrap(), &page(&[4]))
            .with_page(&source.page_url(ENDPOINT, 3, None).unwrap(), &page(&[3]));
        let listing = source.candidates(&fetcher, None).await;
        assert_eq!(listing.candidates.len(), 2);

        let source = self::source(1, 5);
        let fetcher = StaticFetcher::new().with_page(&source.page_url(ENDPOINT, 1, None).unwrap(), &page(&[5]));
        let listing = source.candidates(&fetcher, None).await;
        assert_eq!(listing.candidates.len(), 1);
        assert_eq!(listing.failed, 0);
    }

    #[tokio::test]
    async fn test_since_is_sent_and_first_page_failure_counts() {
        let source = source(100, 1);
        let since = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        let fetcher = StaticFetcher::new();
        let listing = source.candidates(&fetcher, Some(since)).await;

        assert_eq!(listing.failed, 1);
        assert!(listing.candidates.is_empty());
        assert!(fetcher.requested()[0].contains("after=2025-05-01"));
    }
}
