//! HTTP client for the content service
//!
//! Endpoints:
//! - `GET  /collections/{collectionId}/items` → `Item[]`
//! - `GET  /read-along/{itemId}` → `ReadAlongData` (404 = no read-along)
//! - `POST /progress` with a `ProgressRecord` body
//! - `GET  /progress/{itemId}` → `ProgressRecord` (404 = never saved)

use super::{ItemSource, ProgressSink, ReadAlongSource};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use lectern_common::{Item, ProgressRecord, ReadAlongData};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

/// reqwest-based client for the content service
#[derive(Debug, Clone)]
pub struct ContentClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl ContentClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Self::with_client(http, config)
    }

    /// Build on an existing reqwest client (shared connection pool)
    pub fn with_client(http: reqwest::Client, config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid api.base_url {:?}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "api.base_url {:?} cannot carry paths",
                config.base_url
            )));
        }

        Ok(Self {
            http,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Underlying reqwest client (also used by the audio backend for probing)
    pub fn http_client(&self) -> reqwest::Client {
        self.http.clone()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("api.base_url cannot carry paths".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a GET and decode the body; 404 maps to `None`
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = self.request(Method::GET, url.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("GET {} -> 404", url);
            return Ok(None);
        }
        let response = check_status(response, &url)?;
        Ok(Some(response.json::<T>().await?))
    }

    pub async fn fetch_items(&self, collection_id: &str) -> Result<Vec<Item>> {
        let url = self.endpoint(&["collections", collection_id, "items"])?;
        self.get_optional::<Vec<Item>>(url)
            .await?
            .ok_or_else(|| Error::NotFound(format!("collection {}", collection_id)))
    }

    pub async fn fetch_read_along(&self, item_id: &str) -> Result<Option<ReadAlongData>> {
        let url = self.endpoint(&["read-along", item_id])?;
        self.get_optional(url).await
    }

    pub async fn save_progress(&self, record: &ProgressRecord) -> Result<()> {
        let url = self.endpoint(&["progress"])?;
        let response = self.request(Method::POST, url.clone()).json(record).send().await?;
        check_status(response, &url)?;
        Ok(())
    }

    pub async fn fetch_progress(&self, item_id: &str) -> Result<Option<ProgressRecord>> {
        let url = self.endpoint(&["progress", item_id])?;
        self.get_optional(url).await
    }
}

fn check_status(response: Response, url: &Url) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::Service(format!("{} returned {}", url, status)))
    }
}

#[async_trait]
impl ProgressSink for ContentClient {
    async fn save_progress(&self, record: &ProgressRecord) -> Result<()> {
        ContentClient::save_progress(self, record).await
    }

    async fn fetch_progress(&self, item_id: &str) -> Result<Option<ProgressRecord>> {
        ContentClient::fetch_progress(self, item_id).await
    }
}

#[async_trait]
impl ReadAlongSource for ContentClient {
    async fn fetch_read_along(&self, item_id: &str) -> Result<Option<ReadAlongData>> {
        ContentClient::fetch_read_along(self, item_id).await
    }
}

#[async_trait]
impl ItemSource for ContentClient {
    async fn fetch_items(&self, collection_id: &str) -> Result<Vec<Item>> {
        ContentClient::fetch_items(self, collection_id).await
    }
}
