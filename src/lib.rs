//! Asset Uploadr Library
//!
//! Uploads a local file to a remote asset service as concurrently transferred
//! byte-range partitions, then links the asset to a commerce product.
//!
//! # Features
//!
//! - **Partitioned Upload**: one task per partition, joined before confirmation
//! - **Concurrency-Safe Store**: partitions live behind a reader/writer lock
//! - **Rate-Limit Backoff**: `e^attempt - 1` delays with an explicit cap
//! - **Eventual Consistency**: fixed-cadence retry when resolving products
//!
//! # Example
//!
//! ```no_run
//! use asset_uploadr::associate::associate_asset_with_product;
//! use asset_uploadr::client::{AssetServiceClient, ClientConfig};
//! use asset_uploadr::retry::{RetryPolicy, TokioSleeper};
//! use asset_uploadr::upload::upload_asset;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AssetServiceClient::new(ClientConfig::new("token"))?;
//!     let allowed = vec!["image/jpeg".to_string()];
//!
//!     let asset = upload_asset("photo.jpg", &allowed, &client).await?;
//!     let asset_id = asset.id.unwrap_or_default();
//!     associate_asset_with_product(&asset_id, "42", &client, &RetryPolicy::default(), &TokioSleeper)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod asset;
pub mod associate;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod upload;

// Re-export commonly used types
pub use asset::{Asset, Partition};
pub use config::Config;
pub use error::{Error, ErrorKind, Result, UploadStage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
