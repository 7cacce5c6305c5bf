//! Fixed configuration of the collection endpoint.

use url::Url;

/// Where the collection lives and how much of it one fetch asks for.
///
/// The production endpoint is fixed; tests point the base url at a
/// scripted transport instead.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    base_url: Url,
    page_limit: u32,
    page_offset: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://pokeapi.co/api/v2/pokemon")
                .expect("default collection url is valid"),
            page_limit: 10_000,
            page_offset: 0,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn with_page_offset(mut self, offset: u32) -> Self {
        self.page_offset = offset;
        self
    }

    /// Full URL of the one request the collection fetch issues.
    pub fn collection_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("limit", &self.page_limit.to_string())
            .append_pair("offset", &self.page_offset.to_string());
        url
    }
}
