use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Shared JSON-over-HTTPS plumbing: per-provider throttling, request timeout,
/// a single retry and slow-call warnings.
pub(crate) struct ApiClient {
    pub(crate) name: String,
    http: reqwest::Client,
    pub(crate) rate_limit: Duration,
    pub(crate) slow_warn: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl ApiClient {
    pub(crate) fn new(name: &str, rate_limit_ms: Option<u64>, call_timeout_ms: Option<u64>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tunecast/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(call_timeout_ms.unwrap_or(15_000)))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            name: name.to_string(),
            http,
            rate_limit: Duration::from_millis(rate_limit_ms.unwrap_or(150)),
            slow_warn: Duration::from_secs(5),
            last_call: Mutex::new(None),
        })
    }

    pub(crate) async fn throttle(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.rate_limit {
                tokio::time::sleep(self.rate_limit - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub(crate) fn warn_if_slow(&self, start: Instant, op: &str) {
        let elapsed = start.elapsed();
        if elapsed > self.slow_warn {
            warn!(provider = %self.name, op, ?elapsed, "slow upstream call");
        }
    }

    /// GET `url` and decode the body as JSON. Non-2xx statuses are errors.
    pub(crate) async fn get_json(&self, url: Url, headers: &[(&str, &str)], op: &str) -> Result<Value> {
        self.throttle().await;
        let start = Instant::now();
        let res = self.retry_once(|| self.send(url.clone(), headers), op).await;
        self.warn_if_slow(start, op);
        res
    }

    async fn send(&self, url: Url, headers: &[(&str, &str)]) -> Result<Value> {
        debug!(provider = %self.name, url = %redacted(&url), "GET");
        let mut req = self.http.get(url);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let resp = req.send().await?.error_for_status()?;
        Ok(resp.json::<Value>().await?)
    }

    pub(crate) async fn retry_once<T, F, Fut>(&self, mut f: F, op: &str) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match f().await {
            Ok(v) => Ok(v),
            Err(e1) => {
                warn!(provider = %self.name, op, error = %e1, "call failed, retrying");
                tokio::time::sleep(Duration::from_millis(200)).await;
                f().await.map_err(|e| anyhow!("{} after retry: {}", op, e))
            }
        }
    }
}

/// Path segments long enough to be API keys are masked before logging.
fn redacted(url: &Url) -> String {
    let mut out = url.clone();
    let masked: Vec<String> = url
        .path_segments()
        .map(|segs| segs.map(|s| if s.len() >= 24 { "***".to_string() } else { s.to_string() }).collect())
        .unwrap_or_default();
    if !masked.is_empty() {
        out.set_path(&masked.join("/"));
    }
    out.to_string()
}
