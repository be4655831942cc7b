//! RSS 2.0, RSS 1.0 (RDF) and Atom feeds.

use serde::Deserialize;
use tracing::debug;

use super::{ExtractError, Source, SourceSettings};
use crate::config::SourceConfig;
use crate::models::Candidate;
use crate::utils::html_to_text;

#[derive(Debug)]
pub struct FeedSource {
    settings: SourceSettings,
    urls: Vec<String>,
}

impl FeedSource {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            settings: SourceSettings::from(config),
            urls: config.urls.clone(),
        }
    }
}

impl Source for FeedSource {
    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn listing_urls(&self) -> Vec<String> {
        self.urls.clone()
    }

    fn extract(&self, url: &str, body: &str) -> Result<Vec<Candidate>, ExtractError> {
        let candidates = parse_feed(body)?;
        debug!(source = %self.settings.id, %url, count = candidates.len(), "Parsed feed");
        Ok(candidates)
    }
}

/// Parse a feed document of any supported flavour into candidates.
pub fn parse_feed(body: &str) -> Result<Vec<Candidate>, ExtractError> {
    let body = body.trim_start_matches('\u{feff}');
    let head = &body[..floor_char_boundary(body, 2048)];

    if head.contains("<rss") {
        let rss: Rss = quick_xml::de::from_str(body)?;
        Ok(rss.channel.items.into_iter().filter_map(RssItem::into_candidate).collect())
    } else if head.contains("<rdf:RDF") {
        let rdf: Rdf = quick_xml::de::from_str(body)?;
        Ok(rdf.items.into_iter().filter_map(RssItem::into_candidate).collect())
    } else if head.contains("<feed") {
        let feed: AtomFeed = quick_xml::de::from_str(body)?;
        Ok(feed.entries.into_iter().filter_map(AtomEntry::into_candidate).collect())
    } else {
        Err(ExtractError::Unrecognized(
            "neither an RSS nor an Atom document".to_string(),
        ))
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date", default)]
    dc_date: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RssItem {
    fn into_candidate(self) -> Option<Candidate> {
        let url = self.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
        Some(Candidate {
            url,
            title: self.title.map(|t| html_to_text(&t)),
            date_text: self.pub_date.or(self.dc_date),
            body: self.description.map(|d| html_to_text(&d)),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    summary: Option<AtomText>,
    #[serde(default)]
    content: Option<AtomText>,
}

/// Atom text constructs carry a `type` attribute, so they are read as
/// elements rather than plain strings.
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

impl AtomEntry {
    fn into_candidate(self) -> Option<Candidate> {
        let alternate = self
            .links
            .iter()
            .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
            .or_else(|| self.links.first())?;
        let url = alternate.href.trim().to_string();
        if url.is_empty() {
            return None;
        }
        Some(Candidate {
            url,
            title: self.title.map(|t| html_to_text(&t.value)),
            date_text: self.published.or(self.updated),
            body: self.summary.or(self.content).map(|t| html_to_text(&t.value)),
        })
    }
}
