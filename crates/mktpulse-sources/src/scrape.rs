//! Follower counts scraped from rendered profile pages.

use regex::Regex;

use crate::browser::{render_page, BrowserConfig};
use crate::error::SourceError;
use crate::normalize::normalize_count;

/// Reduces a DOM dump to its visible text: scripts and styles dropped, tags
/// replaced by spaces, common entities decoded, whitespace collapsed.
pub(crate) fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let tag = &rest[open..];
        let skip_to = ["script", "style"]
            .iter()
            .find(|name| starts_with_tag(tag, name))
            .and_then(|name| find_ascii_ci(tag, &format!("</{name}")));
        let after = match skip_to {
            Some(close) => &tag[close..],
            None => tag,
        };
        match after.find('>') {
            Some(end) => {
                out.push(' ');
                rest = &after[end + 1..];
            }
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    decode_entities(&out)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn starts_with_tag(tag: &str, name: &str) -> bool {
    let body = &tag[1..];
    body.get(..name.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(name))
        && body[name.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == '>' || c.is_whitespace())
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Finds the first `<number><K|M>? <label>` occurrence in `text` and returns
/// the normalized count.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the label never follows a number.
pub fn extract_count(text: &str, label: &str) -> Result<u64, SourceError> {
    let pattern = format!(r"(?i)(\d[\d.,]*[KM]?)\s+{}(?:\W|$)", regex::escape(label));
    let re = Regex::new(&pattern)
        .map_err(|e| SourceError::Parse(format!("invalid label pattern '{label}': {e}")))?;
    let raw = re
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| SourceError::Parse(format!("no '<count> {label}' text on page")))?;
    normalize_count(raw).ok_or_else(|| SourceError::Parse(format!("'{raw}' is not a count")))
}

/// Renders `url` and reads the count displayed next to `label`.
///
/// # Errors
///
/// - [`SourceError::Browser`] if the page cannot be rendered.
/// - [`SourceError::Parse`] if no count is displayed.
pub async fn scrape_followers(
    browser: &BrowserConfig,
    url: &str,
    label: &str,
) -> Result<u64, SourceError> {
    let dom = render_page(browser, url).await?;
    let count = extract_count(&html_to_text(&dom), label)?;
    tracing::debug!(url, label, count, "scraped follower count");
    Ok(count)
}
