use log::*;
use wpg_common::{helpers::parse_integer, Secret};

pub const DEFAULT_INDEXER_URL: &str = "https://api.helius.xyz";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_PAGES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct IndexerConfig {
    /// Base URL of the indexer REST API, without a trailing slash
    pub base_url: String,
    pub api_key: Secret<String>,
    /// Number of transactions requested per page
    pub page_size: usize,
    /// Upper bound on the number of pages fetched for a single lookup
    pub max_pages: usize,
}

impl IndexerConfig {
    pub fn new(base_url: &str, api_key: Secret<String>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { base_url, api_key, page_size: DEFAULT_PAGE_SIZE, max_pages: DEFAULT_MAX_PAGES }
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("WPG_INDEXER_URL").unwrap_or_else(|_| {
            warn!("🛰️ WPG_INDEXER_URL not set, using {DEFAULT_INDEXER_URL} as default");
            DEFAULT_INDEXER_URL.to_string()
        });
        let api_key = Secret::new(std::env::var("WPG_INDEXER_API_KEY").unwrap_or_else(|_| {
            warn!("🛰️ WPG_INDEXER_API_KEY not set. Ledger lookups will probably be rejected.");
            String::default()
        }));
        let mut config = Self::new(&base_url, api_key);
        match parse_integer::<usize>(std::env::var("WPG_INDEXER_PAGE_SIZE").ok()) {
            Some(Ok(n)) if n > 0 => config.page_size = n,
            Some(_) => warn!("🛰️ Invalid WPG_INDEXER_PAGE_SIZE. Using the default of {DEFAULT_PAGE_SIZE}"),
            None => {},
        }
        match parse_integer::<usize>(std::env::var("WPG_INDEXER_MAX_PAGES").ok()) {
            Some(Ok(n)) if n > 0 => config.max_pages = n,
            Some(_) => warn!("🛰️ Invalid WPG_INDEXER_MAX_PAGES. Using the default of {DEFAULT_MAX_PAGES}"),
            None => {},
        }
        config
    }
}
