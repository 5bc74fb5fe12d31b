use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use tracing::debug;

use super::{DataPersistence, collect_files, join_segments};
use crate::config::S3Config;
use crate::error::{Error, Result};
use crate::scheme::split_protocol;

const PROTOCOL: &str = "s3";

/// Driver for `s3://bucket/key` URIs on AWS or any S3-compatible endpoint.
pub struct S3Persistence {
    region: Region,
    credentials: Credentials,
    path_style: bool,
    default_prefix: Option<String>,
}

impl S3Persistence {
    pub const NAME: &'static str = "s3";

    pub fn new(config: &S3Config) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", config.region));
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint,
        };
        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| Error::Config(format!("S3 credentials: {e}")))?;
        Ok(Self {
            region,
            credentials,
            path_style: config.path_style,
            default_prefix: config.default_prefix.clone(),
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| Error::access(format!("{PROTOCOL}://{name}"), e))?;
        Ok(if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }

    /// `s3://bucket/a/b` -> `("bucket", "a/b")`
    fn split(path: &str) -> Result<(&str, &str)> {
        match split_protocol(path) {
            (Some(PROTOCOL), rest) => {
                let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(Error::access(path, anyhow!("missing bucket name")));
                }
                Ok((bucket, key.trim_start_matches('/')))
            }
            _ => Err(Error::access(path, anyhow!("not an s3:// path"))),
        }
    }

    async fn list_keys(&self, bucket: &Bucket, path: &str, prefix: &str) -> Result<Vec<String>> {
        let results = bucket
            .list(prefix.to_string(), None)
            .await
            .map_err(|e| Error::access(path, e))?;
        Ok(results
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| object.key)
            .collect())
    }

    async fn download(&self, bucket: &Bucket, path: &str, key: &str, to: &Path) -> Result<()> {
        let response = bucket
            .get_object(key)
            .await
            .map_err(|e| Error::access(path, e))?;
        ensure_success(path, "GET", response.status_code())?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(to, response.to_vec()).await?;
        Ok(())
    }

    async fn upload(&self, bucket: &Bucket, path: &str, key: &str, from: &Path) -> Result<()> {
        let data = tokio::fs::read(from).await?;
        let response = bucket
            .put_object(key, &data)
            .await
            .map_err(|e| Error::access(path, e))?;
        ensure_success(path, "PUT", response.status_code())
    }
}

fn ensure_success(path: &str, op: &str, status: u16) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(Error::access(path, anyhow!("S3 {op} returned HTTP {status}")))
    }
}

/// HEAD status to presence: 2xx is found, 404 is absent, anything else fails.
fn head_found(path: &str, status: u16) -> Result<bool> {
    match status {
        404 => Ok(false),
        status => ensure_success(path, "HEAD", status).map(|_| true),
    }
}

/// Path of `key` below `prefix`, or `None` for keys outside it and for
/// zero-byte "folder" markers.
fn object_relative<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix)
        .filter(|relative| !relative.is_empty() && !relative.ends_with('/'))
}

fn dir_prefix(key: &str) -> String {
    let key = key.trim_end_matches('/');
    if key.is_empty() {
        String::new()
    } else {
        format!("{key}/")
    }
}

#[async_trait]
impl DataPersistence for S3Persistence {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let (bucket_name, key) = Self::split(path)?;
        let bucket = self.bucket(bucket_name)?;
        let found = match bucket.head_object(key).await {
            Ok((_, status)) => head_found(path, status)?,
            Err(S3Error::HttpFailWithBody(status, _)) => head_found(path, status)?,
            Err(e) => return Err(Error::access(path, e)),
        };
        if found {
            return Ok(true);
        }
        // No object under the exact key; it may still be a "directory".
        let keys = self.list_keys(&bucket, path, &dir_prefix(key)).await?;
        Ok(!keys.is_empty())
    }

    async fn get(&self, from: &str, to: &Path, recursive: bool) -> Result<()> {
        let (bucket_name, key) = Self::split(from)?;
        let bucket = self.bucket(bucket_name)?;
        if !recursive {
            debug!(from, to = %to.display(), "s3 get");
            return self.download(&bucket, from, key, to).await;
        }

        let prefix = dir_prefix(key);
        let keys = self.list_keys(&bucket, from, &prefix).await?;
        debug!(from, to = %to.display(), objects = keys.len(), "s3 recursive get");
        tokio::fs::create_dir_all(to).await?;
        for object_key in &keys {
            let Some(relative) = object_relative(&prefix, object_key) else {
                continue;
            };
            self.download(&bucket, from, object_key, &to.join(relative))
                .await?;
        }
        Ok(())
    }

    async fn put(&self, from: &Path, to: &str, recursive: bool) -> Result<()> {
        let (bucket_name, key) = Self::split(to)?;
        let bucket = self.bucket(bucket_name)?;
        if !recursive {
            debug!(from = %from.display(), to, "s3 put");
            return self.upload(&bucket, to, key, from).await;
        }

        let files = collect_files(from).await?;
        debug!(from = %from.display(), to, objects = files.len(), "s3 recursive put");
        for (source, relative) in &files {
            let object_key = join_segments([key, relative.as_str()]);
            self.upload(&bucket, to, &object_key, source).await?;
        }
        Ok(())
    }

    fn construct_path(
        &self,
        add_protocol: bool,
        add_prefix: bool,
        segments: &[&str],
    ) -> Result<String> {
        let prefix = self.default_prefix.as_deref().filter(|_| add_prefix);
        let path = join_segments(prefix.into_iter().chain(segments.iter().copied()));
        if add_protocol {
            Ok(format!("{PROTOCOL}://{path}"))
        } else {
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> S3Persistence {
        S3Persistence::new(&S3Config {
            endpoint: Some("http://localhost:9000".to_string()),
            region: "us-east-1".to_string(),
            access_key: Some("minio".to_string()),
            secret_key: Some("minio123".to_string()),
            default_prefix: Some("my-bucket/raw".to_string()),
            path_style: true,
        })
        .unwrap()
    }

    #[test]
    fn split_separates_bucket_and_key() {
        assert_eq!(S3Persistence::split("s3://b/a/c.txt").unwrap(), ("b", "a/c.txt"));
        assert_eq!(S3Persistence::split("s3://b").unwrap(), ("b", ""));
        assert!(S3Persistence::split("gs://b/k").is_err());
        assert!(S3Persistence::split("s3:///k").is_err());
    }

    #[test]
    fn construct_path_uses_default_prefix() {
        let driver = driver();
        assert_eq!(
            driver.construct_path(true, true, &["abc", "x.csv"]).unwrap(),
            "s3://my-bucket/raw/abc/x.csv"
        );
        assert_eq!(driver.construct_path(false, false, &["b", "k"]).unwrap(), "b/k");
    }

    #[test]
    fn dir_prefix_adds_single_trailing_slash() {
        assert_eq!(dir_prefix("a/b"), "a/b/");
        assert_eq!(dir_prefix("a/b/"), "a/b/");
        assert_eq!(dir_prefix(""), "");
    }

    #[test]
    fn head_status_maps_to_presence() {
        assert!(head_found("s3://b/k", 200).unwrap());
        assert!(!head_found("s3://b/k", 404).unwrap());
        assert!(matches!(head_found("s3://b/k", 403), Err(Error::Access { .. })));
    }

    #[test]
    fn ensure_success_accepts_only_2xx() {
        assert!(ensure_success("s3://b/k", "PUT", 200).is_ok());
        assert!(ensure_success("s3://b/k", "PUT", 204).is_ok());
        let err = ensure_success("s3://b/k", "GET", 500).unwrap_err();
        assert!(err.to_string().contains("S3 GET returned HTTP 500"));
    }

    #[test]
    fn folder_markers_and_foreign_keys_are_skipped() {
        assert_eq!(object_relative("dir/", "dir/a/b.txt"), Some("a/b.txt"));
        assert_eq!(object_relative("dir/", "dir/"), None);
        assert_eq!(object_relative("dir/", "dir/sub/"), None);
        assert_eq!(object_relative("dir/", "other/x"), None);
        assert_eq!(object_relative("", "top.txt"), Some("top.txt"));
    }
}
