//! Walks a resolved fallback chain against the network, one source at a time,
//! stopping at the first one that answers.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Method, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::types::ResolvedUri;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeAttempt {
    pub url: String,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub ok: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeReport {
    pub attempts: Vec<ProbeAttempt>,
    /// First source that answered with a success status.
    pub reachable: Option<String>,
}

pub struct GatewayProbe {
    http: reqwest::Client,
}

impl GatewayProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tunecast/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building probe client")?;
        Ok(Self { http })
    }

    pub async fn probe(&self, uri: &ResolvedUri) -> ProbeReport {
        let mut report = ProbeReport::default();
        for url in uri.sources() {
            if url.starts_with("data:") {
                report.attempts.push(ProbeAttempt { url: url.clone(), status: None, error: None, ok: true });
                report.reachable = Some(url);
                break;
            }
            let attempt = self.check(&url).await;
            let ok = attempt.ok;
            debug!(url = %attempt.url, status = ?attempt.status, ok, "probe");
            report.attempts.push(attempt);
            if ok {
                report.reachable = Some(url);
                break;
            }
        }
        report
    }

    async fn check(&self, url: &str) -> ProbeAttempt {
        let mut res = self.http.request(Method::HEAD, url).send().await;
        // Some gateways refuse HEAD; ask for a single byte instead.
        let refused = matches!(
            &res,
            Ok(resp) if matches!(resp.status(), StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED)
        );
        if refused {
            res = self.http.get(url).header(header::RANGE, "bytes=0-0").send().await;
        }
        match res {
            Ok(resp) => ProbeAttempt {
                url: url.to_string(),
                status: Some(resp.status().as_u16()),
                error: None,
                ok: resp.status().is_success(),
            },
            Err(e) => ProbeAttempt { url: url.to_string(), status: None, error: Some(e.to_string()), ok: false },
        }
    }
}
