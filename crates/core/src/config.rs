use serde::{Deserialize, Serialize};

/// Driver settings consumed by [`crate::PersistenceRegistry::register_defaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub s3: Option<S3Config>,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Falls back to the AWS environment/profile chain when either key is unset.
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Bucket (and optional key prefix) used by `construct_path(.., add_prefix = true, ..)`.
    pub default_prefix: Option<String>,
    #[serde(default = "default_true")]
    pub path_style: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_defaults_apply_when_omitted() {
        let config: PersistenceConfig = serde_json::from_str("{}").unwrap();
        assert!(config.s3.is_none());
        assert_eq!(config.http.timeout_secs, 120);
        assert_eq!(config.http.max_retries, 5);
    }

    #[test]
    fn s3_section_fills_region_and_path_style() {
        let config: PersistenceConfig =
            serde_json::from_str(r#"{"s3": {"endpoint": "http://localhost:9000"}}"#).unwrap();
        let s3 = config.s3.unwrap();
        assert_eq!(s3.region, "us-east-1");
        assert!(s3.path_style);
        assert!(s3.access_key.is_none());
    }
}
