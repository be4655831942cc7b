//! Small text helpers shared by the harvesters and the notifier.
//!
//! - Whitespace collapsing for scraped element text
//! - HTML-to-text conversion for rendered titles and feed summaries
//! - String truncation for logging

use scraper::{ElementRef, Html};

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text content of an element, whitespace-collapsed.
///
/// Text nodes are concatenated as-is, so inline markup inside a word
/// (`Stable<b>coin</b>`) does not split it.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Strip tags from an HTML fragment and decode its entities.
///
/// WordPress serves `title.rendered` as HTML (`Bitcoin &#8211; the &amp; sign`),
/// and feed descriptions often embed markup.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(html_to_text("<p>AUSTRAC &amp; ASIC</p>"), "AUSTRAC & ASIC");
/// ```
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains(['<', '&']) {
        return collapse_whitespace(fragment);
    }
    let parsed = Html::parse_fragment(fragment);
    element_text(parsed.root_element())
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes, on a character boundary, with
/// an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}
