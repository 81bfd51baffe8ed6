use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};

// Fixed external endpoint used to tell "backend down" apart from "no
// internet path at all". Body is ignored; only the status matters.
pub const CONNECTIVITY_PROBE_URL: &str = "https://clients3.google.com/generate_204";

// The upstream service defines no timeout of its own; without one here a
// hung request would hold the in-flight guard across many poll ticks.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where job postings come from: one real backend over HTTP, plus in-memory
/// implementations in tests. Body parsing and validation stay with the
/// caller.
pub trait JobSource: Send + Sync {
    fn base_url(&self) -> &str;

    /// GET `<base>/` reachability probe; resolves to the response status.
    fn health(&self) -> impl Future<Output = Result<u16>> + Send;

    /// GET the fixed external probe; resolves to the response status.
    fn connectivity(&self) -> impl Future<Output = Result<u16>> + Send;

    /// GET `<base>/jobs`; resolves to the status and the raw body.
    fn fetch_jobs(&self) -> impl Future<Output = Result<(u16, String)>> + Send;
}

pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn jobs_url(&self) -> String {
        format!("{}/jobs", self.base_url)
    }

    async fn get_status(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;
        Ok(response.status().as_u16())
    }
}

impl JobSource for HttpSource {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn health(&self) -> Result<u16> {
        self.get_status(&format!("{}/", self.base_url)).await
    }

    async fn connectivity(&self) -> Result<u16> {
        self.get_status(CONNECTIVITY_PROBE_URL).await
    }

    async fn fetch_jobs(&self) -> Result<(u16, String)> {
        let url = self.jobs_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {url}"))?;
        Ok((status, body))
    }
}
