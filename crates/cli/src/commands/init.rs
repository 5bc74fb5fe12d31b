use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use stagehand_core::config::{HttpConfig, S3Config};
use stagehand_core::PersistenceConfig;

use crate::config::AppConfig;

#[derive(Args)]
pub struct InitArgs {
    /// Local sandbox directory for staged downloads
    #[arg(long)]
    sandbox: PathBuf,

    /// Prefix under which uploads are placed (e.g. s3://bucket/raw)
    #[arg(long)]
    raw_output: String,

    /// S3 endpoint URL (enables the s3:// driver)
    #[arg(long)]
    s3_endpoint: Option<String>,

    /// S3 region
    #[arg(long, default_value = "us-east-1")]
    s3_region: String,

    /// S3 access key (falls back to the AWS environment)
    #[arg(long)]
    s3_access_key: Option<String>,

    /// S3 secret key (falls back to the AWS environment)
    #[arg(long)]
    s3_secret_key: Option<String>,

    /// Default bucket/prefix for generated S3 paths
    #[arg(long)]
    s3_default_prefix: Option<String>,
}

pub async fn run(args: InitArgs) -> Result<()> {
    let raw_output_bucket = args
        .raw_output
        .strip_prefix("s3://")
        .map(|rest| rest.to_string());
    let wants_s3 =
        args.s3_endpoint.is_some() || args.s3_access_key.is_some() || raw_output_bucket.is_some();

    let s3 = wants_s3.then(|| S3Config {
        endpoint: args.s3_endpoint,
        region: args.s3_region,
        access_key: args.s3_access_key,
        secret_key: args.s3_secret_key,
        default_prefix: args.s3_default_prefix.or(raw_output_bucket),
        path_style: true,
    });

    let config = AppConfig {
        sandbox_dir: args.sandbox,
        raw_output_prefix: args.raw_output,
        persistence: PersistenceConfig {
            s3,
            http: HttpConfig::default(),
        },
    };

    // Validates the driver settings and creates the sandbox.
    config.file_access()?;
    config.save()?;

    info!(
        config_path = %AppConfig::config_path().display(),
        sandbox = %config.sandbox_dir.display(),
        raw_output = %config.raw_output_prefix,
        "Config saved"
    );
    println!("Config: {}", AppConfig::config_path().display());
    Ok(())
}
