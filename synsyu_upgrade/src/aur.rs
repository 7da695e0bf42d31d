/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::aur
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Query the Arch User Repository RPC API for one bounded
    batch of package names at a time.

  Security / Safety Notes:
    Performs read-only HTTPS requests to the public AUR API.
    No credentials are transmitted.

  Dependencies:
    reqwest for HTTP, serde for response parsing, tokio for
    the request semaphore and backoff timers.

  Operational Scope:
    Production RegistryClient used by the batched correlator.

  Revision History:
    2024-11-04 COD  Implemented asynchronous AUR client.
    2026-10-18 COD  Narrowed to per-batch info lookups returned
                    in query order; batching moved to correlate.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Retry logic with exponential backoff
    - Structured response parsing with explicit error paths
    - Configurable timeouts, parallelism and bandwidth ceiling
============================================================*/

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use urlencoding::encode;

use crate::config::AurConfig;
use crate::error::{Result, SynsyuError};
use crate::package::RegistryEntry;
use crate::providers::RegistryClient;

/// Client for interacting with the AUR RPC API.
#[derive(Clone)]
pub struct AurClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: usize,
    max_kib_per_sec: u64,
    permits: Arc<Semaphore>,
}

impl AurClient {
    /// Construct a new client from configuration.
    pub fn new(config: &AurConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(concat!("Syn-Syu-Upgrade/", env!("CARGO_PKG_VERSION"), " (linux)"))
            .build()
            .map_err(|err| SynsyuError::Network(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.max(1),
            max_kib_per_sec: config.max_kib_per_sec,
            permits: Arc::new(Semaphore::new(config.max_parallel_requests.max(1))),
        })
    }

    fn compose_url(&self, packages: &[String]) -> String {
        let mut url = format!("{}?v=5&type=info", self.base_url);
        for pkg in packages {
            url.push_str("&arg[]=");
            url.push_str(&encode(pkg));
        }
        url
    }

    async fn fetch(&self, url: &str) -> Result<Vec<AurEntry>> {
        let mut attempt = 0;
        loop {
            let response = self.client.get(url).send().await.map_err(|err| {
                SynsyuError::Network(format!("AUR request to {url} failed: {err}"))
            })?;
            let content_len = response.content_length();

            if response.status() == StatusCode::OK {
                let payload = response.json::<AurResponse>().await.map_err(|err| {
                    SynsyuError::Serialization(format!("Failed to decode AUR response: {err}"))
                })?;

                if let Some(error) = payload.error {
                    return Err(SynsyuError::Network(format!(
                        "AUR responded with error for {url}: {error}"
                    )));
                }

                self.enforce_rate_limit(content_len).await;
                return Ok(payload.results);
            }

            attempt += 1;
            if attempt >= self.max_retries {
                return Err(SynsyuError::Network(format!(
                    "AUR request {url} failed with status {} after {attempt} attempts",
                    response.status()
                )));
            }
            let exponent = (attempt as u32).min(8);
            let backoff = Duration::from_millis(200_u64.saturating_mul(1_u64 << exponent));
            sleep(backoff).await;
        }
    }

    async fn enforce_rate_limit(&self, content_length: Option<u64>) {
        if let Some(delay) = content_length.and_then(|bytes| throttle_delay(bytes, self.max_kib_per_sec))
        {
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl RegistryClient for AurClient {
    async fn info(&self, names: &[String]) -> Result<Vec<RegistryEntry>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SynsyuError::Runtime("AUR semaphore closed".into()))?;
        let results = self.fetch(&self.compose_url(names)).await?;
        Ok(in_query_order(names, results))
    }
}

/// Reorder results to follow `names`, dropping duplicates and names that
/// were never asked for.
fn in_query_order(names: &[String], results: Vec<AurEntry>) -> Vec<RegistryEntry> {
    let position: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();

    let mut ordered: Vec<(usize, RegistryEntry)> = results
        .into_iter()
        .filter_map(|entry| {
            let idx = *position.get(entry.name.as_str())?;
            Some((
                idx,
                RegistryEntry {
                    name: entry.name,
                    version: entry.version,
                    last_modified: entry.last_modified,
                },
            ))
        })
        .collect();
    ordered.sort_by_key(|(idx, _)| *idx);
    ordered.dedup_by_key(|(idx, _)| *idx);
    ordered.into_iter().map(|(_, entry)| entry).collect()
}

#[derive(Debug, Deserialize)]
struct AurResponse {
    #[serde(default)]
    results: Vec<AurEntry>,
    #[serde(rename = "error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AurEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "LastModified", default)]
    last_modified: i64,
}

fn throttle_delay(bytes: u64, kib_per_sec: u64) -> Option<Duration> {
    if kib_per_sec == 0 {
        return None;
    }
    let denominator = kib_per_sec.saturating_mul(1024);
    // Ceil division to avoid exceeding the requested rate.
    let millis = bytes.saturating_mul(1000).saturating_add(denominator - 1) / denominator;
    if millis == 0 {
        None
    } else {
        Some(Duration::from_millis(millis))
    }
}
