//! Request and response payloads of the asset service API

use serde::{Deserialize, Serialize};

/// Payload to register the metadata of a new asset
#[derive(Debug, Clone, Serialize)]
pub struct CreateAssetRequest {
    pub name: String,
    pub size: u64,
    pub mime: String,
}

/// Response to asset metadata creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssetResponse {
    pub id: String,
    pub upload_id: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub chunk_size: Option<u64>,
    #[serde(default)]
    pub urls: Vec<ChunkUrl>,
}

/// One chunk boundary reported by the service, with its pre-signed URL
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkUrl {
    pub part: i64,
    pub start: u64,
    pub end: u64,
    pub url: String,
}

/// Payload confirming that all parts were uploaded
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmUploadRequest {
    pub upload_id: String,
    pub parts: Vec<ConfirmedPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: i64,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Payload associating an asset with one or more products
#[derive(Debug, Clone, Serialize)]
pub struct AttachProductsRequest {
    pub products: Vec<String>,
}

/// One page of the product listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductListResponse {
    #[serde(default)]
    pub data: Vec<Product>,
    #[serde(default)]
    pub links: PageLinks,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    /// Opaque id assigned by the asset service
    pub id: String,
    /// Id of the product in the commerce system
    pub product_id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub variant_id: Option<u64>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub last_page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total: u64,
}
