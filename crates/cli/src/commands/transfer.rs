use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::AppConfig;
use crate::progress;

#[derive(Args)]
pub struct PutArgs {
    /// Local file or directory
    local: PathBuf,

    /// Destination; generated under the raw output prefix when omitted
    remote: Option<String>,

    /// Upload a whole directory tree
    #[arg(short, long)]
    recursive: bool,
}

#[derive(Args)]
pub struct GetArgs {
    /// Source path or URI
    remote: String,

    /// Local destination
    local: PathBuf,

    /// Download a whole directory tree
    #[arg(short, long)]
    recursive: bool,
}

#[derive(Args)]
pub struct ExistsArgs {
    /// Path or URI to check
    path: String,
}

pub async fn put(args: PutArgs) -> Result<()> {
    let config = AppConfig::load()?;
    let fa = config.file_access()?;
    let recursive = args.recursive || args.local.is_dir();

    let spinner = progress::create_spinner(&format!("Uploading {}", args.local.display()));
    let remote = fa
        .put(&args.local, args.remote.as_deref(), recursive)
        .await?;
    spinner.finish_with_message("done");

    println!("{remote}");
    Ok(())
}

pub async fn get(args: GetArgs) -> Result<()> {
    let config = AppConfig::load()?;
    let fa = config.file_access()?;

    let spinner = progress::create_spinner(&format!("Downloading {}", args.remote));
    fa.get(&args.remote, &args.local, args.recursive).await?;
    spinner.finish_with_message("done");

    println!("{}", args.local.display());
    Ok(())
}

pub async fn exists(args: ExistsArgs) -> Result<()> {
    let config = AppConfig::load()?;
    let fa = config.file_access()?;

    if fa.exists(&args.path).await? {
        println!("{} exists", args.path);
        Ok(())
    } else {
        anyhow::bail!("{} does not exist", args.path)
    }
}
