//! Upload module
//!
//! Sequences the upload of one asset: open the file, register metadata with
//! the remote service, transfer all parts concurrently, confirm the upload.
//!
//! # Example
//!
//! ```no_run
//! use asset_uploadr::client::{AssetServiceClient, ClientConfig};
//! use asset_uploadr::upload::upload_asset;
//!
//! # async fn example() -> asset_uploadr::Result<()> {
//! let client = AssetServiceClient::new(ClientConfig::new("token"))?;
//! let allowed = vec!["image/jpeg".to_string()];
//!
//! let asset = upload_asset("photo.jpg", &allowed, &client).await?;
//! println!("Uploaded asset {:?}", asset.id);
//! # Ok(())
//! # }
//! ```

use crate::asset::{Asset, Partition};
use crate::error::{Error, Result, UploadStage};
use crate::metrics;
use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;

pub mod parts;

pub use parts::upload_all_parts;

/// Remote side of an asset upload
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Register the asset and fill its partition store from the reported chunks
    async fn create_metadata(&self, asset: &mut Asset) -> Result<()>;

    /// Upload every partition and record its confirmation tag
    async fn upload_parts(&self, asset: &Asset) -> Result<()>;

    /// Submit the part number / tag pairs of all partitions
    async fn confirm_upload(&self, asset: &Asset) -> Result<()>;
}

/// Transfer of a single partition
#[async_trait]
pub trait PartTransfer: Send + Sync + 'static {
    /// Send the partition's bytes to its URL and return the confirmation tag
    async fn transfer(&self, part: &Partition) -> Result<String>;
}

/// Upload the file at `path` through `uploader`
///
/// The asset's file handle is released before returning, whatever the
/// outcome. Nothing already created remotely is rolled back on failure.
#[tracing::instrument(
    name = "upload.asset",
    skip(path, allowed_mime_types, uploader),
    fields(file = %path.as_ref().display()),
    err
)]
pub async fn upload_asset<P: AsRef<Path>>(
    path: P,
    allowed_mime_types: &[String],
    uploader: &dyn Uploader,
) -> Result<Asset> {
    let started = Instant::now();

    let mut asset = match Asset::open(path, allowed_mime_types) {
        Ok(asset) => asset,
        Err(e) => {
            metrics::record_asset_failure(UploadStage::OpenAsset.as_str());
            return Err(at_stage(UploadStage::OpenAsset, e));
        }
    };

    let result = run_stages(&mut asset, uploader).await;
    asset.close();

    match result {
        Ok(()) => {
            metrics::record_asset_success(
                asset.partition_count(),
                started.elapsed().as_secs_f64(),
            );
            tracing::info!(
                asset_id = asset.id.as_deref().unwrap_or_default(),
                parts = asset.partition_count(),
                bytes = asset.size,
                "Asset upload confirmed"
            );
            Ok(asset)
        }
        Err(e) => {
            if let Some(stage) = e.stage() {
                metrics::record_asset_failure(stage.as_str());
            }
            Err(e)
        }
    }
}

async fn run_stages(asset: &mut Asset, uploader: &dyn Uploader) -> Result<()> {
    uploader
        .create_metadata(asset)
        .await
        .map_err(|e| at_stage(UploadStage::CreateMetadata, e))?;

    uploader
        .upload_parts(asset)
        .await
        .map_err(|e| at_stage(UploadStage::UploadParts, e))?;

    uploader
        .confirm_upload(asset)
        .await
        .map_err(|e| at_stage(UploadStage::ConfirmUpload, e))
}

fn at_stage(stage: UploadStage, source: Error) -> Error {
    Error::Stage {
        stage,
        source: Box::new(source),
    }
}
