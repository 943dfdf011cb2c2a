//! Product association
//!
//! Links an uploaded asset to a commerce product. The product catalogue of
//! the asset service is eventually consistent with the store, so the product
//! is looked up with a fixed-interval retry before the link request is sent.

use crate::error::{Error, Result, ResultExt};
use crate::retry::{retry_fixed, RetryPolicy, Sleeper};
use async_trait::async_trait;

/// Remote operations needed to associate an asset with a product
#[async_trait]
pub trait Associator: Send + Sync {
    /// Resolve the service's own id for an external (store) product id
    async fn find_product_id(&self, external_product_id: u64) -> Result<String>;

    /// Link `product_id` (as returned by `find_product_id`) to `asset_id`
    async fn attach_product(&self, asset_id: &str, product_id: &str) -> Result<()>;
}

/// Parse an external product identifier
pub fn parse_product_id(raw: &str) -> Result<u64> {
    let id: u64 = raw
        .trim()
        .parse()
        .map_err(|e| Error::Validation(format!("cannot convert '{}' to integer: {}", raw, e)))?;
    if id == 0 {
        return Err(Error::Validation("product id must be positive".into()));
    }
    Ok(id)
}

/// Resolve `external_product_id` and link it to `asset_id`
///
/// Returns the resolved product id.
#[tracing::instrument(
    name = "associate.product",
    skip(associator, policy, sleeper),
    fields(product.resolved = tracing::field::Empty),
    err
)]
pub async fn associate_asset_with_product(
    asset_id: &str,
    external_product_id: &str,
    associator: &dyn Associator,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Result<String> {
    let external_id = parse_product_id(external_product_id)?;

    let product_id = retry_fixed(policy, sleeper, move |_attempt| {
        associator.find_product_id(external_id)
    })
    .await
    .context("cannot find product")?;
    tracing::Span::current().record("product.resolved", product_id.as_str());

    associator
        .attach_product(asset_id, &product_id)
        .await
        .context("cannot associate product with asset")?;

    tracing::info!(
        asset_id = asset_id,
        product_id = %product_id,
        external_product_id = external_id,
        "Associated asset with product"
    );
    Ok(product_id)
}
