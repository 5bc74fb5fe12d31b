use anyhow::Result;
use clap::Args;

use crate::config::AppConfig;

#[derive(Args)]
pub struct DriversArgs;

pub async fn run(_args: DriversArgs) -> Result<()> {
    let config = AppConfig::load()?;
    let registry = config.registry()?;

    println!("{:<12} DRIVER", "SCHEME");
    for scheme in registry.schemes() {
        let probe = if scheme.as_str() == "/" {
            "/".to_string()
        } else {
            format!("{scheme}probe")
        };
        let driver = match registry.resolve(&probe) {
            Ok(driver) => driver.name().to_string(),
            Err(e) => format!("unavailable ({e})"),
        };
        println!("{:<12} {driver}", scheme.as_str());
    }
    Ok(())
}
