use std::collections::HashSet;

use async_trait::async_trait;
use select::document::Document;
use select::node::Node;
use select::predicate::{Name, Predicate, Text};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::network::{ClientResult, HttpClient};

/// One link from a directory index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    /// Link text as displayed, without a trailing slash.
    pub name: String,
    pub url: String,
    pub is_dir: bool,
    /// Visible text of the whole row, which usually carries the date.
    pub raw: String,
}

/// Anything that can turn a directory URL into its entries.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn list(&self, url: &Url) -> ClientResult<Vec<ListingEntry>>;
}

/// Index pages fetched over HTTP (H5AI, Apache, nginx autoindex).
pub struct H5aiListing {
    http: HttpClient,
}

impl H5aiListing {
    pub const fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ListingSource for H5aiListing {
    async fn list(&self, url: &Url) -> ClientResult<Vec<ListingEntry>> {
        let html = self.http.get_text(url).await?;
        Ok(parse_listing(&html, url))
    }
}

/// `url` with a trailing slash, so relative links resolve inside it.
pub fn as_directory(url: &Url) -> Url {
    if url.path().ends_with('/') {
        return url.clone();
    }
    let mut dir = url.clone();
    let path = format!("{}/", url.path());
    dir.set_path(&path);
    dir
}

/// Extract the entries of an index page.
///
/// Table rows and list items are read first, taking the first named link of
/// each; pages without any fall back to every anchor. Parent links, sort
/// links and anything outside `page_url` are dropped.
pub fn parse_listing(html: &str, page_url: &Url) -> Vec<ListingEntry> {
    let page_url = as_directory(page_url);
    let document = Document::from(html);
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for row in document.find(Name("tr").or(Name("li"))) {
        let raw = visible_text(&row);
        let entry = row
            .find(Name("a"))
            .find_map(|anchor| to_entry(&anchor, &page_url, &raw));
        if let Some(entry) = entry {
            if seen.insert(entry.url.clone()) {
                entries.push(entry);
            }
        }
    }

    if entries.is_empty() {
        for anchor in document.find(Name("a")) {
            // Autoindex pages put the date in the text right after the link.
            let trailing = anchor.next().and_then(|n| n.as_text()).unwrap_or_default();
            let raw = squash([anchor.text().as_str(), trailing]);
            if let Some(entry) = to_entry(&anchor, &page_url, &raw) {
                if seen.insert(entry.url.clone()) {
                    entries.push(entry);
                }
            }
        }
    }

    entries
}

fn to_entry(anchor: &Node<'_>, page_url: &Url, raw: &str) -> Option<ListingEntry> {
    let href = anchor.attr("href")?.trim();
    let text = squash([anchor.text().as_str()]);

    if text.is_empty() || matches!(text.as_str(), ".." | "../" | "Parent Directory") {
        return None;
    }
    if href.is_empty() || href.starts_with(['?', '#']) || matches!(href, "../" | "..") {
        return None;
    }

    let url = page_url.join(href).ok()?;
    if !url.as_str().starts_with(page_url.as_str()) || url.as_str() == page_url.as_str() {
        return None;
    }
    if url.query().is_some() {
        return None;
    }

    Some(ListingEntry {
        name: text.trim_end_matches('/').to_string(),
        is_dir: url.path().ends_with('/'),
        url: url.to_string(),
        raw: raw.to_string(),
    })
}

fn visible_text(node: &Node<'_>) -> String {
    squash(node.find(Text).filter_map(|n| n.as_text()))
}

/// Join text fragments with single spaces.
fn squash<'s>(parts: impl IntoIterator<Item = &'s str>) -> String {
    parts
        .into_iter()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
