use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{DataPersistence, join_segments};
use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// Read-only driver for `http://` and `https://` URLs.
///
/// Serves two protocols, so it can never pick one in `construct_path`.
#[derive(Clone)]
pub struct HttpPersistence {
    http: reqwest::Client,
    max_retries: u32,
}

impl HttpPersistence {
    pub const NAME: &'static str = "http";

    pub fn new(config: &HttpConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            max_retries: config.max_retries,
        })
    }

    /// Sends with back-off on 429/503, honoring `Retry-After`.
    async fn send(&self, method: reqwest::Method, url: &str) -> Result<reqwest::Response> {
        let mut retries = 0;
        loop {
            let resp = self
                .http
                .request(method.clone(), url)
                .send()
                .await
                .map_err(|e| Error::access(url, e))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
            {
                retries += 1;
                if retries > self.max_retries {
                    return Err(Error::access(url, anyhow!("max retries exceeded ({status})")));
                }
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or_else(|| backoff_secs(retries));
                warn!(url, retry_after, retries, "rate limited, backing off");
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                continue;
            }
            return Ok(resp);
        }
    }
}

const MAX_BACKOFF_SECS: u64 = 300;

/// Exponential fallback when the server sends no usable `Retry-After`.
fn backoff_secs(retries: u32) -> u64 {
    2u64.saturating_pow(retries).min(MAX_BACKOFF_SECS)
}

#[async_trait]
impl DataPersistence for HttpPersistence {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let resp = self.send(reqwest::Method::HEAD, path).await?;
        match resp.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(false),
            status => Err(Error::access(path, anyhow!("HEAD returned {status}"))),
        }
    }

    async fn get(&self, from: &str, to: &Path, recursive: bool) -> Result<()> {
        if recursive {
            return Err(Error::unsupported(Self::NAME, "recursive get"));
        }
        let resp = self.send(reqwest::Method::GET, from).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::access(from, anyhow!("GET returned {status}: {body}")));
        }
        let data = resp.bytes().await.map_err(|e| Error::access(from, e))?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(to, &data).await?;
        debug!(url = from, to = %to.display(), bytes = data.len(), "http get");
        Ok(())
    }

    async fn put(&self, _from: &Path, _to: &str, _recursive: bool) -> Result<()> {
        Err(Error::unsupported(Self::NAME, "put"))
    }

    fn construct_path(
        &self,
        add_protocol: bool,
        _add_prefix: bool,
        segments: &[&str],
    ) -> Result<String> {
        if add_protocol {
            return Err(Error::unsupported(
                Self::NAME,
                "adding a protocol (serves both http and https)",
            ));
        }
        Ok(join_segments(segments.iter().copied()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    const RATE_LIMITED: &str =
        "HTTP/1.1 429 Too Many Requests\r\nRetry-After: 0\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const UNAVAILABLE: &str =
        "HTTP/1.1 503 Service Unavailable\r\nRetry-After: 0\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const NOT_FOUND: &str =
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const HELLO: &str =
        "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello";

    /// Answers one connection per canned response, in order. Returns the base
    /// URL and a counter of requests received.
    async fn serve(responses: Vec<&'static str>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                counter.fetch_add(1, Ordering::SeqCst);
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn driver(max_retries: u32) -> HttpPersistence {
        HttpPersistence::new(&HttpConfig {
            timeout_secs: 10,
            max_retries,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn get_retries_rate_limits_and_creates_parents() {
        let (base, hits) = serve(vec![RATE_LIMITED, UNAVAILABLE, HELLO]).await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/deeper/out.txt");

        driver(5)
            .get(&format!("{base}/data.txt"), &target, false)
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let (base, hits) = serve(vec![RATE_LIMITED, RATE_LIMITED]).await;
        let dir = tempfile::tempdir().unwrap();

        let err = driver(1)
            .get(&format!("{base}/data.txt"), &dir.path().join("out"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Access { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn missing_object_does_not_exist() {
        let (base, hits) = serve(vec![NOT_FOUND]).await;
        assert!(!driver(5).exists(&format!("{base}/gone")).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_secs(1), 2);
        assert_eq!(backoff_secs(3), 8);
        assert_eq!(backoff_secs(64), MAX_BACKOFF_SECS);
        assert_eq!(backoff_secs(u32::MAX), MAX_BACKOFF_SECS);
    }

    #[test]
    fn construct_path_refuses_protocol() {
        let driver = HttpPersistence::new(&HttpConfig::default()).unwrap();
        let result = driver.construct_path(true, false, &["example.com", "a"]);
        assert!(matches!(result, Err(Error::UnsupportedOperation { .. })));
        assert_eq!(
            driver.construct_path(false, true, &["example.com/", "a.csv"]).unwrap(),
            "example.com/a.csv"
        );
    }

    #[tokio::test]
    async fn writes_are_unsupported() {
        let driver = HttpPersistence::new(&HttpConfig::default()).unwrap();
        let put = driver.put(Path::new("/tmp/x"), "https://example.com/x", false).await;
        assert!(matches!(put, Err(Error::UnsupportedOperation { .. })));

        let dir = tempfile::tempdir().unwrap();
        let get = driver.get("https://example.com/d", dir.path(), true).await;
        assert!(matches!(get, Err(Error::UnsupportedOperation { .. })));
    }
}
