//! Stream liveness probing
//!
//! A probe is one lightweight request per URL with a short timeout. There are
//! no retries: a transient failure counts as dead for this run.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{header, redirect, Client, StatusCode};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};

/// Statuses that count as reachable
const LIVE_STATUSES: &[StatusCode] = &[
    StatusCode::OK,
    StatusCode::PARTIAL_CONTENT,
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
];

/// Reachability check for a single stream URL
#[async_trait]
pub trait StreamProbe: Send + Sync {
    /// Ok(()) when live, `ProbeFailed` otherwise
    async fn probe(&self, url: &str) -> PipelineResult<()>;

    async fn is_live(&self, url: &str) -> bool {
        match self.probe(url).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("{}", e);
                false
            }
        }
    }
}

/// HEAD-based prober, falls back to a one-byte ranged GET when HEAD is refused
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(user_agent: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        // Redirects are not followed: 301/302 already prove the origin answers
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }

    fn verdict(url: &str, status: StatusCode) -> PipelineResult<()> {
        if LIVE_STATUSES.contains(&status) {
            Ok(())
        } else {
            Err(PipelineError::probe_failed(url, format!("HTTP {}", status.as_u16())))
        }
    }
}

#[async_trait]
impl StreamProbe for HttpProber {
    async fn probe(&self, url: &str) -> PipelineResult<()> {
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| PipelineError::probe_failed(url, e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            let resp = self
                .client
                .get(url)
                .header(header::RANGE, "bytes=0-0")
                .send()
                .await
                .map_err(|e| PipelineError::probe_failed(url, e.to_string()))?;
            return Self::verdict(url, resp.status());
        }

        Self::verdict(url, status)
    }
}

/// Prober used when probing is disabled
pub struct AlwaysLive;

#[async_trait]
impl StreamProbe for AlwaysLive {
    async fn probe(&self, _url: &str) -> PipelineResult<()> {
        Ok(())
    }
}

/// Probe every distinct URL with at most `concurrency` probes in flight
///
/// Returns only once every probe has finished, so completion order never
/// reaches the caller.
pub async fn probe_all<P, I>(prober: &P, urls: I, concurrency: usize) -> HashMap<String, bool>
where
    P: StreamProbe + ?Sized,
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let unique: Vec<String> = urls.into_iter().filter(|u| seen.insert(u.clone())).collect();

    stream::iter(unique)
        .map(|url| async move {
            let live = prober.is_live(&url).await;
            (url, live)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records the peak number of concurrent probes
    struct CountingProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    impl CountingProbe {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StreamProbe for CountingProbe {
        async fn probe(&self, url: &str) -> PipelineResult<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(url.to_string());
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if url.contains("dead") {
                Err(PipelineError::probe_failed(url, "HTTP 404"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_probe_all_is_bounded_and_deduplicated() {
        let probe = CountingProbe::new();
        let mut urls: Vec<String> = (0..50).map(|i| format!("http://s/{}", i)).collect();
        urls.push("http://s/0".to_string());
        urls.push("http://s/dead".to_string());

        let results = probe_all(&probe, urls, 4).await;

        assert_eq!(results.len(), 51);
        assert_eq!(probe.calls.lock().unwrap().len(), 51);
        assert!(probe.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(results.get("http://s/0"), Some(&true));
        assert_eq!(results.get("http://s/dead"), Some(&false));
    }

    #[tokio::test]
    async fn test_always_live() {
        let results = probe_all(&AlwaysLive, vec!["http://x/1".to_string()], 0).await;
        assert_eq!(results.get("http://x/1"), Some(&true));
    }

    #[tokio::test]
    async fn test_http_probe_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ok.m3u8"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/moved.m3u8"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone.m3u8"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let prober = HttpProber::new("Mozilla/5.0", 2_000).unwrap();
        assert!(prober.is_live(&format!("{}/ok.m3u8", server.uri())).await);
        assert!(prober.is_live(&format!("{}/moved.m3u8", server.uri())).await);
        assert!(!prober.is_live(&format!("{}/gone.m3u8", server.uri())).await);
    }

    #[tokio::test]
    async fn test_http_probe_falls_back_to_ranged_get() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header_eq("range", "bytes=0-0"))
            .respond_with(ResponseTemplate::new(206).set_body_string("x"))
            .mount(&server)
            .await;

        let prober = HttpProber::new("Mozilla/5.0", 2_000).unwrap();
        assert!(prober.is_live(&format!("{}/live.ts", server.uri())).await);
    }

    #[tokio::test]
    async fn test_http_probe_timeout_is_dead() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let prober = HttpProber::new("Mozilla/5.0", 100).unwrap();
        assert!(!prober.is_live(&server.uri()).await);
    }
}
