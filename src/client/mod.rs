//! Asset service client
//!
//! HTTP/JSON client for the remote asset service. Every service request
//! carries the bearer token and goes through the exponential backoff policy;
//! partition transfers go straight to their pre-signed URLs.
//!
//! # Example
//!
//! ```no_run
//! use asset_uploadr::client::{AssetServiceClient, ClientConfig};
//!
//! # async fn example() -> asset_uploadr::Result<()> {
//! let config = ClientConfig {
//!     base_url: "http://localhost:8080/api/v1".to_string(),
//!     ..ClientConfig::new("secret-token")
//! };
//! let client = AssetServiceClient::new(config)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | Create metadata | `asset.create_metadata` | name, size, asset.id, parts_count |
//! | Upload part | `asset.upload_part` | part_number, upload.bytes, etag, status_code |
//! | Confirm upload | `asset.confirm_upload` | asset.id, parts_count |
//! | Find product | `product.find` | product_id, pages |
//! | Attach product | `product.attach` | asset.id, product_id |

pub mod models;

use crate::asset::{Asset, Partition};
use crate::associate::Associator;
use crate::config::Config;
use crate::error::{Error, Result, ResultExt};
use crate::retry::{send_with_backoff, BackoffPolicy, Sleeper, TokioSleeper};
use crate::upload::{upload_all_parts, PartTransfer, Uploader};
use async_trait::async_trait;
use models::{
    AttachProductsRequest, ChunkUrl, ConfirmUploadRequest, ConfirmedPart, CreateAssetRequest,
    CreateAssetResponse, ProductListResponse,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Default service endpoint
pub const DEFAULT_BASE_URL: &str = "https://app.digital-downloads.com/api/v1";

/// Default transport timeout; files may be large and connections slow
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Asset service client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
    pub backoff: BackoffPolicy,
    /// Follow `links.next` when searching products instead of stopping at page one
    pub scan_all_pages: bool,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
            backoff: BackoffPolicy::default(),
            scan_all_pages: false,
        }
    }

    /// Build from the application configuration
    pub fn from_config(config: &Config, token: impl Into<String>) -> Self {
        Self {
            base_url: config.api.base_url.clone(),
            token: token.into(),
            timeout: Duration::from_secs(config.api.timeout_seconds),
            backoff: config.retry.backoff_policy(),
            scan_all_pages: config.product_search.scan_all_pages,
        }
    }
}

/// Asset service client
pub struct AssetServiceClient {
    config: ClientConfig,
    http: reqwest::Client,
    sleeper: Arc<dyn Sleeper>,
}

impl AssetServiceClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::network("failed to build HTTP client", e))?;

        Ok(Self {
            config,
            http,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used between rate-limited attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Send an authorized request, backing off while rate limited
    async fn execute<B>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        expected: StatusCode,
    ) -> Result<reqwest::Response>
    where
        B: Serialize + Sync + ?Sized,
    {
        let send = move || {
            let method = method.clone();
            async move {
                let mut request = self
                    .http
                    .request(method, url)
                    .bearer_auth(&self.config.token);
                if let Some(body) = body {
                    request = request.json(body);
                }

                let response = request
                    .send()
                    .await
                    .map_err(|e| Error::network("failed to send request", e))?;

                let status = response.status();
                if status == expected {
                    return Ok(response);
                }
                if status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(Error::RateLimited);
                }

                let text = response.text().await.unwrap_or_default();
                tracing::debug!(url = url, status = status.as_u16(), body = %text, "Unexpected response");
                Err(Error::Protocol(format!(
                    "expected HTTP status code {}, got {}: {}",
                    expected.as_u16(),
                    status.as_u16(),
                    text.trim()
                )))
            }
        };

        send_with_backoff(&self.config.backoff, self.sleeper.as_ref(), send).await
    }

    async fn execute_json<B, T>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        expected: StatusCode,
    ) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.execute(method, url, body, expected).await?;
        let text = response
            .text()
            .await
            .map_err(|e| Error::network("could not read response body", e))?;

        serde_json::from_str(&text).map_err(|e| {
            Error::Protocol(format!(
                "could not decode response {} into {}: {}",
                text,
                std::any::type_name::<T>(),
                e
            ))
        })
    }

    fn part_sender(&self) -> PartSender {
        PartSender {
            http: self.http.clone(),
        }
    }

    async fn fetch_product_page(&self, url: &str) -> Result<ProductListResponse> {
        tracing::debug!(url = url, "Fetching product page");
        self.execute_json::<(), _>(Method::GET, url, None, StatusCode::OK)
            .await
    }
}

#[async_trait]
impl Uploader for AssetServiceClient {
    #[tracing::instrument(
        name = "asset.create_metadata",
        skip(self, asset),
        fields(
            name = %asset.base_name(),
            size = asset.size,
            asset.id = tracing::field::Empty,
            parts_count = tracing::field::Empty
        ),
        err
    )]
    async fn create_metadata(&self, asset: &mut Asset) -> Result<()> {
        let body = CreateAssetRequest {
            name: asset.base_name(),
            size: asset.size,
            mime: asset.mime_type.clone(),
        };
        tracing::debug!(request = ?body, "Create metadata request");

        let response: CreateAssetResponse = self
            .execute_json(
                Method::POST,
                &self.url("/assets/signed"),
                Some(&body),
                StatusCode::OK,
            )
            .await
            .context("request failed")?;

        if response.id.is_empty() || response.upload_id.is_empty() {
            return Err(Error::Protocol(
                "response is missing the asset id or upload id".into(),
            ));
        }
        check_chunks(&response.urls, asset.size)?;

        let span = tracing::Span::current();
        span.record("asset.id", response.id.as_str());
        span.record("parts_count", response.urls.len());

        asset.id = Some(response.id);
        asset.upload_id = Some(response.upload_id);

        for chunk in response.urls {
            let part = Partition::new(chunk.part, chunk.url, chunk.start, chunk.end);
            asset
                .set_partition(part)
                .await
                .with_context(|| format!("could not store partition #{}", chunk.part))?;
        }

        Ok(())
    }

    async fn upload_parts(&self, asset: &Asset) -> Result<()> {
        upload_all_parts(asset, Arc::new(self.part_sender())).await
    }

    #[tracing::instrument(
        name = "asset.confirm_upload",
        skip(self, asset),
        fields(
            asset.id = asset.id.as_deref().unwrap_or_default(),
            parts_count = asset.partition_count()
        ),
        err
    )]
    async fn confirm_upload(&self, asset: &Asset) -> Result<()> {
        let asset_id = asset
            .id
            .as_deref()
            .ok_or_else(|| Error::Validation("asset has no remote id".into()))?;
        let upload_id = asset
            .upload_id
            .clone()
            .ok_or_else(|| Error::Validation("asset has no upload session".into()))?;

        let mut parts = Vec::with_capacity(asset.partition_count());
        for id in asset.partition_ids() {
            let part = asset.partition(id).context("could not get partition")?;
            if !part.is_uploaded() {
                return Err(Error::Validation(format!(
                    "partition #{} has no confirmation tag",
                    part.id
                )));
            }
            parts.push(ConfirmedPart {
                part_number: part.id,
                etag: part.etag,
            });
        }

        let body = ConfirmUploadRequest { upload_id, parts };
        tracing::debug!(request = ?body, "Confirmation request");

        self.execute(
            Method::POST,
            &self.url(&format!("/assets/{}/uploaded", asset_id)),
            Some(&body),
            StatusCode::CREATED,
        )
        .await
        .context("request failed")?;

        Ok(())
    }
}

#[async_trait]
impl Associator for AssetServiceClient {
    #[tracing::instrument(
        name = "product.find",
        skip(self),
        fields(pages = tracing::field::Empty),
        err
    )]
    async fn find_product_id(&self, external_product_id: u64) -> Result<String> {
        let mut next = Some(self.url(&format!("/products?product_id={}", external_product_id)));
        let mut searched = Vec::new();
        let mut pages = 0u32;

        while let Some(url) = next.take() {
            let page = self
                .fetch_product_page(&url)
                .await
                .context("failed to list products")?;
            pages += 1;

            if let Some(product) = page
                .data
                .iter()
                .find(|p| p.product_id == external_product_id)
            {
                tracing::Span::current().record("pages", pages);
                return Ok(product.id.clone());
            }
            searched.extend(page.data.iter().map(|p| p.product_id));

            if self.config.scan_all_pages {
                next = page
                    .links
                    .next
                    .filter(|n| !n.is_empty() && *n != url);
            }
        }

        tracing::Span::current().record("pages", pages);
        tracing::debug!(
            product_id = external_product_id,
            searched = ?searched,
            "Product not found in listing"
        );
        Err(Error::NotFound(format!(
            "product_id '{}' does not exist in the asset service",
            external_product_id
        )))
    }

    #[tracing::instrument(name = "product.attach", skip(self), err)]
    async fn attach_product(&self, asset_id: &str, product_id: &str) -> Result<()> {
        let body = AttachProductsRequest {
            products: vec![product_id.to_string()],
        };

        self.execute(
            Method::POST,
            &self.url(&format!("/assets/{}/attach", asset_id)),
            Some(&body),
            StatusCode::CREATED,
        )
        .await
        .context("request failed")?;

        Ok(())
    }
}

/// Reported chunks must be non-empty, uniquely numbered and tile `[0, size)`
fn check_chunks(chunks: &[ChunkUrl], size: u64) -> Result<()> {
    if chunks.is_empty() {
        return Err(Error::Protocol(format!(
            "response reports no partitions for a file of {} bytes",
            size
        )));
    }
    if let Some(chunk) = chunks.iter().find(|u| u.end <= u.start) {
        return Err(Error::Protocol(format!(
            "response suggests using a zero-length partition (part {}: {}..{})",
            chunk.part, chunk.start, chunk.end
        )));
    }

    let mut seen = HashSet::with_capacity(chunks.len());
    if let Some(chunk) = chunks.iter().find(|u| !seen.insert(u.part)) {
        return Err(Error::Protocol(format!(
            "response reports partition #{} more than once",
            chunk.part
        )));
    }

    let mut ranges: Vec<_> = chunks.iter().map(|u| (u.start, u.end)).collect();
    ranges.sort_unstable();
    let mut covered = 0;
    for (start, end) in ranges {
        if start != covered {
            return Err(Error::Protocol(format!(
                "response partitions do not cover the file: expected offset {}, got {}",
                covered, start
            )));
        }
        covered = end;
    }
    if covered != size {
        return Err(Error::Protocol(format!(
            "response partitions cover {} of {} bytes",
            covered, size
        )));
    }

    Ok(())
}

/// Transfers partitions to their pre-signed URLs
#[derive(Clone)]
pub struct PartSender {
    http: reqwest::Client,
}

impl PartSender {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PartTransfer for PartSender {
    #[tracing::instrument(
        name = "asset.upload_part",
        skip(self, part),
        fields(
            part_number = part.id,
            http.method = "PUT",
            upload.bytes = part.len(),
            etag = tracing::field::Empty,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn transfer(&self, part: &Partition) -> Result<String> {
        let contents = part.contents().cloned().ok_or_else(|| {
            Error::Validation(format!("partition #{} has no contents", part.id))
        })?;

        let response = self
            .http
            .put(&part.url)
            .body(contents)
            .send()
            .await
            .map_err(|e| Error::network("failed to send request", e))?;

        let status = response.status();
        let span = tracing::Span::current();
        span.record("http.status_code", status.as_u16());

        if status != StatusCode::OK {
            return Err(Error::Protocol(format!(
                "response status code not 200 (is {})",
                status.as_u16()
            )));
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string())
            .unwrap_or_default();
        if etag.is_empty() {
            return Err(Error::Protocol("ETag header is empty".into()));
        }

        span.record("etag", etag.as_str());
        Ok(etag)
    }
}
