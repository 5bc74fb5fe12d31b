use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use stagehand_core::{FileAccessProvider, PersistenceConfig, PersistenceRegistry};

const CONFIG_FILE: &str = "stagehand.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub sandbox_dir: PathBuf,
    pub raw_output_prefix: String,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl AppConfig {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stagehand")
            .join(CONFIG_FILE)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!("config not found at {} (run `stagehand init`)", path.display())
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse config")
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn registry(&self) -> Result<Arc<PersistenceRegistry>> {
        let registry = PersistenceRegistry::new();
        registry.register_defaults(&self.persistence)?;
        Ok(Arc::new(registry))
    }

    pub fn file_access(&self) -> Result<Arc<FileAccessProvider>> {
        let provider =
            FileAccessProvider::new(self.registry()?, &self.sandbox_dir, &self.raw_output_prefix)?;
        Ok(Arc::new(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config = AppConfig::from_toml(
            r#"
            sandbox_dir = "/tmp/stagehand"
            raw_output_prefix = "s3://bucket/raw"
            "#,
        )
        .unwrap();
        assert_eq!(config.raw_output_prefix, "s3://bucket/raw");
        assert!(config.persistence.s3.is_none());
        assert_eq!(config.persistence.http.max_retries, 5);
    }

    #[test]
    fn s3_section_registers_s3_driver() {
        let dir = tempfile::tempdir().unwrap();
        let content = format!(
            r#"
            sandbox_dir = "{}"
            raw_output_prefix = "s3://bucket/raw"

            [persistence.s3]
            endpoint = "http://localhost:9000"
            access_key = "minio"
            secret_key = "minio123"
            "#,
            dir.path().join("sandbox").display()
        );
        let config = AppConfig::from_toml(&content).unwrap();
        let fa = config.file_access().unwrap();
        assert!(fa.registry().is_registered("s3://"));
        assert!(fa.local_sandbox_dir().is_dir());
    }
}
