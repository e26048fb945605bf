//! Length-aware pagination
//!
//! A [`LengthAwarePaginator`] holds one page of entities together with the
//! total row count, and derives page arithmetic and page URLs from them.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::collection::Collection;

#[derive(Debug, Clone)]
pub struct LengthAwarePaginator {
    items: Collection,
    total: u64,
    per_page: u32,
    current_page: i64,
    last_page: u64,
    path: String,
    page_name: String,
    query: BTreeMap<String, String>,
    fragment: Option<String>,
}

impl LengthAwarePaginator {
    /// Wrap one page of results
    ///
    /// `per_page` is clamped to at least 1. A missing or invalid
    /// `current_page` resolves to 1.
    pub fn new(items: Collection, total: u64, per_page: u32, current_page: Option<i64>) -> Self {
        let per_page = per_page.max(1);
        Self {
            items,
            total,
            per_page,
            current_page: Self::resolve_current_page(current_page),
            last_page: total.div_ceil(u64::from(per_page)),
            path: "/".to_string(),
            page_name: "page".to_string(),
            query: BTreeMap::new(),
            fragment: None,
        }
    }

    /// Page number to use for a requested page
    pub fn resolve_current_page(page: Option<i64>) -> i64 {
        match page {
            Some(page) if page >= 1 => page,
            _ => 1,
        }
    }

    /// Read a page number from a request value; only whole numbers count
    pub fn parse_page(value: &Value) -> Option<i64> {
        match value {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn with_page_name(mut self, page_name: &str) -> Self {
        self.page_name = page_name.to_string();
        self
    }

    /// Extra query string parameter carried into page URLs
    pub fn append(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn fragment(mut self, fragment: &str) -> Self {
        self.fragment = Some(fragment.to_string());
        self
    }

    pub fn items(&self) -> &Collection {
        &self.items
    }

    pub fn into_items(self) -> Collection {
        self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn current_page(&self) -> i64 {
        self.current_page
    }

    /// Number of the final page; 0 when there are no rows
    pub fn last_page(&self) -> u64 {
        self.last_page
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more_pages(&self) -> bool {
        u64::try_from(self.current_page).map_or(false, |page| page < self.last_page)
    }

    pub fn on_first_page(&self) -> bool {
        self.current_page <= 1
    }

    /// 1-based position of the first item on this page
    pub fn first_item(&self) -> Option<u64> {
        if self.items.is_empty() {
            return None;
        }
        let page = u64::try_from(self.current_page - 1).unwrap_or(0);
        Some(page.saturating_mul(u64::from(self.per_page)).saturating_add(1))
    }

    pub fn last_item(&self) -> Option<u64> {
        self.first_item()
            .map(|first| first.saturating_add(self.items.len() as u64 - 1))
    }

    /// URL of a given page
    pub fn url(&self, page: i64) -> String {
        let page = page.max(1).to_string();
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter().filter(|(key, _)| **key != self.page_name))
            .append_pair(&self.page_name, &page)
            .finish();

        let separator = if self.path.contains('?') { '&' } else { '?' };
        let mut url = format!("{}{}{}", self.path, separator, query);
        if let Some(fragment) = &self.fragment {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }

    pub fn next_page_url(&self) -> Option<String> {
        self.has_more_pages().then(|| self.url(self.current_page + 1))
    }

    pub fn previous_page_url(&self) -> Option<String> {
        (self.current_page > 1).then(|| self.url(self.current_page - 1))
    }
}

impl Serialize for LengthAwarePaginator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(9))?;
        map.serialize_entry("total", &self.total)?;
        map.serialize_entry("per_page", &self.per_page)?;
        map.serialize_entry("current_page", &self.current_page)?;
        map.serialize_entry("last_page", &self.last_page)?;
        map.serialize_entry("next_page_url", &self.next_page_url())?;
        map.serialize_entry("prev_page_url", &self.previous_page_url())?;
        map.serialize_entry("from", &self.first_item())?;
        map.serialize_entry("to", &self.last_item())?;
        map.serialize_entry("data", &self.items)?;
        map.end()
    }
}
