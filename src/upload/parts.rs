//! Concurrent part upload
//!
//! Every partition of an asset is transferred by its own task. Tasks never
//! observe or cancel each other; the caller waits for all of them, then
//! either reports a failure or writes the confirmed partitions back into the
//! asset's store one by one.

use super::PartTransfer;
use crate::asset::{Asset, Partition};
use crate::error::{Error, Result, ResultExt};
use crate::metrics;
use futures::future::join_all;
use std::io;
use std::sync::Arc;
use std::time::Instant;

/// Upload all partitions of `asset` concurrently through `transfer`
#[tracing::instrument(
    name = "upload.parts",
    skip(asset, transfer),
    fields(
        asset.id = asset.id.as_deref().unwrap_or_default(),
        parts_count = tracing::field::Empty
    ),
    err
)]
pub async fn upload_all_parts(asset: &Asset, transfer: Arc<dyn PartTransfer>) -> Result<()> {
    let mut parts = Vec::new();
    for id in asset.partition_ids() {
        parts.push(asset.partition(id).context("could not get asset partition")?);
    }
    tracing::Span::current().record("parts_count", parts.len());

    let ids: Vec<i64> = parts.iter().map(|p| p.id).collect();
    let handles = parts.into_iter().map(|part| {
        let transfer = Arc::clone(&transfer);
        tokio::spawn(async move { upload_one(transfer.as_ref(), part).await })
    });
    let results = join_all(handles).await;

    let total = results.len();
    let mut uploaded = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (id, result) in ids.into_iter().zip(results) {
        match result {
            Ok(Ok(part)) => uploaded.push(part),
            Ok(Err(e)) => failures.push(e),
            Err(e) => failures.push(Error::io(
                format!("upload task for partition #{} did not complete", id),
                io::Error::other(e),
            )),
        }
    }

    if let Some(first) = failures.into_iter().next() {
        return Err(first.context("at least one partition upload failed"));
    }

    for part in uploaded {
        tracing::debug!(part_number = part.id, etag = %part.etag, "Setting partition");
        asset
            .set_partition(part)
            .await
            .context("failed to set partition")?;
    }

    tracing::info!(parts = total, "Uploaded all parts");
    Ok(())
}

async fn upload_one(transfer: &dyn PartTransfer, mut part: Partition) -> Result<Partition> {
    let started = Instant::now();
    let bytes = part.len();

    let result = match transfer.transfer(&part).await {
        Ok(etag) if etag.is_empty() => Err(Error::Protocol("ETag header is empty".into())),
        other => other,
    };
    metrics::record_part(bytes, started.elapsed().as_secs_f64(), result.is_ok());

    let etag = result.with_context(|| format!("failed to upload partition #{}", part.id))?;
    part.etag = etag;
    Ok(part)
}
