use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use stagehand_core::{
    ArtifactDir, ArtifactFile, BlobDimensionality, BlobLiteral, ConversionContext, DirTransformer,
    FileTransformer,
};

use crate::config::AppConfig;
use crate::progress;

#[derive(Args)]
pub struct PackArgs {
    /// Local path or remote URI of the artifact
    path: String,

    /// Treat the artifact as a directory (multipart blob)
    #[arg(long)]
    dir: bool,

    /// Format tag recorded in the literal
    #[arg(long, default_value = "")]
    format: String,
}

#[derive(Args)]
pub struct UnpackArgs {
    /// JSON file holding a blob literal
    literal: PathBuf,
}

pub async fn pack(args: PackArgs) -> Result<()> {
    let config = AppConfig::load()?;
    let ctx = ConversionContext::new(config.file_access()?);

    let spinner = progress::create_spinner(&format!("Packing {}", args.path));
    let literal = if args.dir {
        DirTransformer::with_format(args.format)
            .to_literal(&ctx, &ArtifactDir::new(args.path))
            .await?
    } else {
        FileTransformer::with_format(args.format)
            .to_literal(&ctx, &ArtifactFile::new(args.path))
            .await?
    };
    spinner.finish_with_message("done");

    println!("{}", String::from_utf8(literal.to_bytes()?)?);
    Ok(())
}

pub async fn unpack(args: UnpackArgs) -> Result<()> {
    let config = AppConfig::load()?;
    let ctx = ConversionContext::new(config.file_access()?);

    let data = std::fs::read(&args.literal)
        .with_context(|| format!("failed to read {}", args.literal.display()))?;
    let literal = BlobLiteral::from_bytes(&data).context("failed to parse blob literal")?;

    let spinner = progress::create_spinner(&format!("Materializing {}", literal.uri));
    let local = match literal.dimensionality {
        BlobDimensionality::Multipart => {
            let artifact = DirTransformer::new().to_artifact(&ctx, &literal)?;
            artifact.local_path().await?.to_path_buf()
        }
        BlobDimensionality::Single => {
            let artifact = FileTransformer::new().to_artifact(&ctx, &literal)?;
            artifact.local_path().await?.to_path_buf()
        }
    };
    spinner.finish_with_message("done");

    println!("{}", local.display());
    Ok(())
}
