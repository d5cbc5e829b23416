use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{config::IndexerConfig, EnhancedTransaction, IndexerApiError};

#[derive(Clone)]
pub struct IndexerApi {
    config: IndexerConfig,
    client: Arc<Client>,
}

impl IndexerApi {
    pub fn new(config: IndexerConfig) -> Result<Self, IndexerApiError> {
        if config.base_url.is_empty() {
            return Err(IndexerApiError::Initialization("The indexer base URL is empty".into()));
        }
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| IndexerApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Sends a GET request to `path`. The API key is always appended to the query parameters.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, IndexerApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(Method::GET, url);
        req = req.query(&[("api-key", self.config.api_key.reveal().as_str())]);
        if !params.is_empty() {
            req = req.query(params);
        }
        let response = req.send().await.map_err(|e| IndexerApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| IndexerApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| IndexerApiError::RestResponseError(e.to_string()))?;
            Err(IndexerApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Fetches one page of the most recent transactions touching `address`, newest first. If `before` is given, only
    /// transactions older than that signature are returned.
    pub async fn address_transactions(
        &self,
        address: &str,
        before: Option<&str>,
    ) -> Result<Vec<EnhancedTransaction>, IndexerApiError> {
        let path = format!("/v0/addresses/{address}/transactions");
        let limit = self.config.page_size.to_string();
        let mut params = vec![("limit", limit.as_str())];
        if let Some(sig) = before {
            params.push(("before", sig));
        }
        let page = self.rest_query::<Vec<EnhancedTransaction>>(&path, &params).await?;
        debug!("🛰️ Fetched {} transactions for {address}", page.len());
        Ok(page)
    }

    /// Pages backwards through the transactions touching `address` until one older than `since` (unix seconds) turns
    /// up, or the page limit is reached. Transactions without a timestamp are kept.
    pub async fn transactions_since(
        &self,
        address: &str,
        since: i64,
    ) -> Result<Vec<EnhancedTransaction>, IndexerApiError> {
        let mut result = Vec::new();
        let mut before: Option<String> = None;
        for _ in 0..self.config.max_pages {
            let page = self.address_transactions(address, before.as_deref()).await?;
            let page_len = page.len();
            let last_sig = page.last().map(|tx| tx.signature.clone());
            let mut reached_cutoff = false;
            for tx in page {
                if tx.timestamp.is_some_and(|t| t < since) {
                    reached_cutoff = true;
                    break;
                }
                result.push(tx);
            }
            if reached_cutoff || page_len < self.config.page_size {
                return Ok(result);
            }
            before = last_sig;
        }
        warn!(
            "🛰️ Stopped paging transactions for {address} after {} pages. Older transfers were not inspected.",
            self.config.max_pages
        );
        Ok(result)
    }
}
