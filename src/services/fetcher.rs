//! Source playlist download
//!
//! Every failure is reported as `SourceUnavailable` so the pipeline can drop
//! the source and keep going.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PipelineError, PipelineResult};

/// Anything able to produce the raw text of a playlist source
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    async fn fetch(&self, source_url: &str) -> PipelineResult<String>;
}

/// HTTP fetcher for remote M3U sources
pub struct HttpSourceFetcher {
    client: Client,
    max_retries: u32,
    max_m3u_size_mb: usize,
}

impl HttpSourceFetcher {
    pub fn new(
        user_agent: &str,
        timeout_ms: u64,
        max_retries: u32,
        max_m3u_size_mb: usize,
    ) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(Duration::from_millis(timeout_ms))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            max_retries,
            max_m3u_size_mb,
        })
    }

    fn backoff(attempt: u32) -> Duration {
        let backoff_ms = (1u64 << attempt.min(16)).saturating_mul(500).min(10_000);
        Duration::from_millis(backoff_ms)
    }

    fn friendly_status(status: StatusCode) -> String {
        match status {
            StatusCode::NOT_FOUND => "playlist not found (404)".to_string(),
            StatusCode::FORBIDDEN => "access denied (403)".to_string(),
            StatusCode::TOO_MANY_REQUESTS => "rate limited (429)".to_string(),
            _ => {
                let reason = status.canonical_reason().unwrap_or("Error");
                format!("HTTP {}: {}", status.as_u16(), reason)
            }
        }
    }
}

#[async_trait]
impl PlaylistSource for HttpSourceFetcher {
    async fn fetch(&self, source_url: &str) -> PipelineResult<String> {
        let max_bytes = (self.max_m3u_size_mb as u64) * 1024 * 1024;
        let mut attempt = 0u32;

        loop {
            match self.client.get(source_url).send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        if let Some(len) = resp.content_length() {
                            if len > max_bytes {
                                return Err(PipelineError::source_unavailable(
                                    source_url,
                                    format!(
                                        "playlist too large: {:.1}MB (limit {}MB)",
                                        len as f64 / 1024f64 / 1024f64,
                                        self.max_m3u_size_mb
                                    ),
                                ));
                            }
                        }

                        return resp
                            .text()
                            .await
                            .map_err(|e| PipelineError::source_unavailable(source_url, e.to_string()));
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                        let backoff = Self::backoff(attempt);
                        tracing::warn!(
                            "fetch_retry" = attempt + 1,
                            "reason" = "429",
                            "backoff_ms" = backoff.as_millis() as u64
                        );
                        sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(PipelineError::source_unavailable(
                        source_url,
                        Self::friendly_status(status),
                    ));
                }
                Err(err) => {
                    if attempt < self.max_retries {
                        let backoff = Self::backoff(attempt);
                        tracing::warn!(
                            "fetch_retry" = attempt + 1,
                            "reason" = "network",
                            "backoff_ms" = backoff.as_millis() as u64
                        );
                        sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }

                    let reason = if err.is_timeout() {
                        "timed out".to_string()
                    } else {
                        err.to_string()
                    };
                    return Err(PipelineError::source_unavailable(source_url, reason));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(max_retries: u32) -> HttpSourceFetcher {
        HttpSourceFetcher::new("Mozilla/5.0", 2_000, max_retries, 1).unwrap()
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(HttpSourceFetcher::backoff(0), Duration::from_millis(500));
        assert_eq!(HttpSourceFetcher::backoff(1), Duration::from_millis(1_000));
        assert_eq!(HttpSourceFetcher::backoff(10), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn test_fetch_success_sends_client_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fas.m3u"))
            .and(header_eq("user-agent", "Mozilla/5.0"))
            .and(header_eq("accept", "*/*"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
            .mount(&server)
            .await;

        let body = fetcher(0)
            .fetch(&format!("{}/fas.m3u", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "#EXTM3U\n");
    }

    #[tokio::test]
    async fn test_fetch_non_2xx_is_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher(0)
            .fetch(&format!("{}/missing.m3u", server.uri()))
            .await
            .unwrap_err();
        match err {
            PipelineError::SourceUnavailable { reason, .. } => assert!(reason.contains("404")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let server = MockServer::start().await;
        let body = "x".repeat(2 * 1024 * 1024);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let err = fetcher(0).fetch(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Nothing listens on port 9 of localhost in the test environment
        let err = fetcher(0).fetch("http://127.0.0.1:9/list.m3u").await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }
}
