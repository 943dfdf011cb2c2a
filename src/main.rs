//! Asset Uploadr - multi-part asset upload and product association
//!
//! Uploads one file to the asset service and attaches it to a product.

use anyhow::Context;
use asset_uploadr::associate::associate_asset_with_product;
use asset_uploadr::client::{AssetServiceClient, ClientConfig};
use asset_uploadr::config::{Config, ConfigLoader};
use asset_uploadr::retry::TokioSleeper;
use asset_uploadr::upload::upload_asset;
use asset_uploadr::{metrics, UploadStage};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_MISSING_FILENAME: u8 = 10;
const EXIT_MISSING_PRODUCT: u8 = 20;
const EXIT_MISSING_TOKEN: u8 = 30;
const EXIT_OPEN_ASSET: u8 = 40;
const EXIT_CREATE_METADATA: u8 = 41;
const EXIT_UPLOAD_PARTS: u8 = 42;
const EXIT_CONFIRM_UPLOAD: u8 = 43;
const EXIT_ASSOCIATE: u8 = 50;
const EXIT_CONFIG: u8 = 60;

/// Asset Uploadr - upload an asset and link it to a product
#[derive(Parser, Debug)]
#[command(name = "asset-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the file to upload
    #[arg(long)]
    filename: Option<String>,

    /// Id of the product to associate the asset with
    #[arg(long)]
    product: Option<String>,

    /// Asset service auth token
    #[arg(long)]
    token: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load configuration and build the service client
fn bootstrap(args: &Args, token: String) -> anyhow::Result<(Config, AssetServiceClient)> {
    let config = ConfigLoader::load_or_default(args.config.as_ref())
        .context("could not load configuration")?;
    let client = AssetServiceClient::new(ClientConfig::from_config(&config, token))
        .context("could not build asset service client")?;
    Ok((config, client))
}

fn stage_exit_code(stage: Option<UploadStage>) -> u8 {
    match stage {
        Some(UploadStage::OpenAsset) | None => EXIT_OPEN_ASSET,
        Some(UploadStage::CreateMetadata) => EXIT_CREATE_METADATA,
        Some(UploadStage::UploadParts) => EXIT_UPLOAD_PARTS,
        Some(UploadStage::ConfirmUpload) => EXIT_CONFIRM_UPLOAD,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let Some(filename) = args.filename.clone().filter(|f| !f.is_empty()) else {
        eprintln!("filename flag is mandatory");
        return ExitCode::from(EXIT_MISSING_FILENAME);
    };
    let Some(product) = args.product.clone().filter(|p| !p.is_empty()) else {
        eprintln!("product flag is mandatory");
        return ExitCode::from(EXIT_MISSING_PRODUCT);
    };
    let Some(token) = args.token.clone().filter(|t| !t.is_empty()) else {
        eprintln!("token flag is mandatory");
        return ExitCode::from(EXIT_MISSING_TOKEN);
    };

    info!("Starting Asset Uploadr v{}", asset_uploadr::VERSION);

    let (config, client) = match bootstrap(&args, token) {
        Ok(bootstrapped) => bootstrapped,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Startup failed");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let asset = match upload_asset(&filename, &config.upload.allowed_mime_types, &client).await {
        Ok(asset) => asset,
        Err(e) => {
            eprintln!("could not create asset: {}", e);
            return ExitCode::from(stage_exit_code(e.stage()));
        }
    };
    let asset_id = asset.id.clone().unwrap_or_default();

    let lookup = config.retry.lookup_policy();
    if let Err(e) =
        associate_asset_with_product(&asset_id, &product, &client, &lookup, &TokioSleeper).await
    {
        eprintln!("could not associate asset with product: {}", e);
        return ExitCode::from(EXIT_ASSOCIATE);
    }

    tracing::debug!(metrics = %metrics::gather_text(), "Final metrics");
    println!("successfully uploaded and associated asset {}", asset_id);
    ExitCode::SUCCESS
}
