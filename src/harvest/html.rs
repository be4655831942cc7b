//! HTML listing pages scraped with CSS selectors.
//!
//! Listing URLs may carry a `{keyword}` placeholder, expanded once per search
//! term (e.g. `https://decrypt.co/search/all/{keyword}`). When article
//! selectors are configured, each new candidate's own page is fetched and
//! whatever those selectors find replaces the listing's values.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::{ExtractError, Source, SourceSettings};
use crate::config::{ArticleSelectors, ConfigError, ListingSelectors, SourceConfig};
use crate::fetch::{Fetch, FetchError};
use crate::models::Candidate;
use crate::utils::element_text;

const KEYWORD_PLACEHOLDER: &str = "{keyword}";

#[derive(Debug)]
struct ListingRules {
    item: Option<Selector>,
    heading: Option<Selector>,
    link: Selector,
    link_text: Option<String>,
    title: Option<Selector>,
    date: Option<Selector>,
    date_attr: Option<String>,
    summary: Option<Selector>,
}

#[derive(Debug)]
struct ArticleRules {
    title: Option<Selector>,
    date: Option<Selector>,
    date_attr: Option<String>,
    body: Option<Selector>,
}

#[derive(Debug)]
pub struct HtmlSource {
    settings: SourceSettings,
    urls: Vec<String>,
    search_terms: Vec<String>,
    listing: ListingRules,
    article: Option<ArticleRules>,
    link_pattern: Option<Regex>,
    max_items: Option<usize>,
}

impl HtmlSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        let id = &config.id;
        let selectors = config
            .selectors
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid(format!("html source {id:?} needs listing selectors")))?;
        let link_pattern = config
            .link_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|error| ConfigError::Pattern {
                source_id: id.clone(),
                error,
            })?;

        Ok(Self {
            settings: SourceSettings::from(config),
            urls: config.urls.clone(),
            search_terms: config.search_terms.clone(),
            listing: ListingRules::compile(id, selectors)?,
            article: config
                .article
                .as_ref()
                .map(|article| ArticleRules::compile(id, article))
                .transpose()?,
            link_pattern,
            max_items: config.max_items,
        })
    }

    /// Absolute URL of `anchor` if the source accepts the link.
    fn accepted_link(&self, anchor: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
        let href = anchor.value().attr("href")?.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("javascript:") {
            return None;
        }
        if let Some(wanted) = &self.listing.link_text {
            if !element_text(anchor).eq_ignore_ascii_case(wanted) {
                return None;
            }
        }
        let absolute = match base {
            Some(base) => base.join(href).ok()?.to_string(),
            None => href.to_string(),
        };
        if let Some(pattern) = &self.link_pattern {
            if !pattern.is_match(&absolute) {
                return None;
            }
        }
        Some(absolute)
    }

    fn accepted_pair<'a>(&self, anchor: ElementRef<'a>, base: Option<&Url>) -> Option<(String, ElementRef<'a>)> {
        self.accepted_link(anchor, base).map(|url| (url, anchor))
    }

    fn from_container(&self, container: ElementRef<'_>, base: Option<&Url>) -> Option<Candidate> {
        let rules = &self.listing;
        let (url, anchor) = container
            .select(&rules.link)
            .find_map(|a| self.accepted_pair(a, base))?;

        let title = match &rules.title {
            Some(selector) => container.select(selector).next().map(element_text),
            None => Some(element_text(anchor)),
        };
        let date = rules
            .date
            .as_ref()
            .and_then(|selector| container.select(selector).next())
            .map(|el| date_value(el, rules.date_attr.as_deref()));
        let summary = rules
            .summary
            .as_ref()
            .and_then(|selector| container.select(selector).next())
            .map(element_text);

        Some(Candidate {
            url,
            title,
            date_text: date,
            body: summary,
        })
    }

    /// Without an item selector, titles, dates and summaries are selected
    /// page-wide and paired by position with the headings (or the links when
    /// there is no heading selector). Slots are filtered only after pairing,
    /// so an unlinked heading does not shift later dates.
    fn paired(&self, document: &Html, base: Option<&Url>) -> Vec<Candidate> {
        let rules = &self.listing;
        let slots: Vec<Option<(String, ElementRef<'_>)>> = match &rules.heading {
            Some(heading) => document
                .select(heading)
                .map(|h| h.select(&rules.link).find_map(|a| self.accepted_pair(a, base)))
                .collect(),
            None => document
                .select(&rules.link)
                .map(|a| self.accepted_pair(a, base))
                .collect(),
        };
        let select_all = |selector: &Option<Selector>, attr: Option<&str>| -> Vec<String> {
            selector
                .as_ref()
                .map(|s| document.select(s).map(|el| date_value(el, attr)).collect())
                .unwrap_or_default()
        };
        let titles = select_all(&rules.title, None);
        let dates = select_all(&rules.date, rules.date_attr.as_deref());
        let summaries = select_all(&rules.summary, None);

        slots
            .into_iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let (url, anchor) = slot?;
                Some(Candidate {
                    url,
                    title: match rules.title {
                        Some(_) => titles.get(i).cloned(),
                        None => Some(element_text(anchor)),
                    },
                    date_text: dates.get(i).cloned(),
                    body: summaries.get(i).cloned(),
                })
            })
            .collect()
    }
}

impl ListingRules {
    fn compile(id: &str, selectors: &ListingSelectors) -> Result<Self, ConfigError> {
        Ok(Self {
            item: compile_opt(id, selectors.item.as_deref())?,
            heading: compile_opt(id, selectors.heading.as_deref())?,
            link: compile(id, &selectors.link)?,
            link_text: selectors.link_text.clone(),
            title: compile_opt(id, selectors.title.as_deref())?,
            date: compile_opt(id, selectors.date.as_deref())?,
            date_attr: selectors.date_attr.clone(),
            summary: compile_opt(id, selectors.summary.as_deref())?,
        })
    }
}

impl ArticleRules {
    fn compile(id: &str, selectors: &ArticleSelectors) -> Result<Self, ConfigError> {
        Ok(Self {
            title: compile_opt(id, selectors.title.as_deref())?,
            date: compile_opt(id, selectors.date.as_deref())?,
            date_attr: selectors.date_attr.clone(),
            body: compile_opt(id, selectors.body.as_deref())?,
        })
    }

    /// Overlay whatever the article page provides onto `candidate`.
    fn apply(&self, document: &Html, mut candidate: Candidate) -> Candidate {
        if let Some(title) = self
            .title
            .as_ref()
            .and_then(|s| document.select(s).map(element_text).find(|t| !t.is_empty()))
        {
            candidate.title = Some(title);
        }
        if let Some(date) = self
            .date
            .as_ref()
            .and_then(|s| document.select(s).next())
            .map(|el| date_value(el, self.date_attr.as_deref()))
        {
            candidate.date_text = Some(date);
        }
        if let Some(selector) = &self.body {
            let body = document
                .select(selector)
                .next()
                .map(element_text)
                .unwrap_or_else(|| element_text(document.root_element()));
            candidate.body = Some(body);
        }
        candidate
    }
}

impl Source for HtmlSource {
    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn listing_urls(&self) -> Vec<String> {
        self.urls
            .iter()
            .flat_map(|url| {
                if url.contains(KEYWORD_PLACEHOLDER) {
                    self.search_terms
                        .iter()
                        .map(|term| url.replace(KEYWORD_PLACEHOLDER, &urlencoding::encode(term.trim())))
                        .collect()
                } else {
                    vec![url.clone()]
                }
            })
            .collect()
    }

    fn extract(&self, url: &str, body: &str) -> Result<Vec<Candidate>, ExtractError> {
        let document = Html::parse_document(body);
        let base = Url::parse(url).ok();

        let mut candidates: Vec<Candidate> = match &self.listing.item {
            Some(item) => document
                .select(item)
                .filter_map(|container| self.from_container(container, base.as_ref()))
                .collect(),
            None => self.paired(&document, base.as_ref()),
        };

        let mut seen = std::collections::HashSet::new();
        candidates.retain(|c| seen.insert(c.url.clone()));
        if let Some(max) = self.max_items {
            candidates.truncate(max);
        }
        debug!(source = %self.settings.id, %url, count = candidates.len(), "Parsed listing page");
        Ok(candidates)
    }

    fn enriches(&self) -> bool {
        self.article.is_some()
    }

    #[instrument(level = "debug", skip_all, fields(url = %candidate.url))]
    async fn enrich<F: Fetch>(&self, candidate: Candidate, fetcher: &F) -> Result<Candidate, FetchError> {
        let Some(rules) = &self.article else {
            return Ok(candidate);
        };
        let body = fetcher.get_text(&candidate.url).await?;
        let document = Html::parse_document(&body);
        Ok(rules.apply(&document, candidate))
    }
}

/// The date of an element: the named attribute when present, its text otherwise.
fn date_value(element: ElementRef<'_>, attr: Option<&str>) -> String {
    attr.and_then(|name| element.value().attr(name))
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| element_text(element))
}

fn compile(id: &str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::Selector {
        source_id: id.to_string(),
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn compile_opt(id: &str, selector: Option<&str>) -> Result<Option<Selector>, ConfigError> {
    selector.map(|s| compile(id, s)).transpose()
}
