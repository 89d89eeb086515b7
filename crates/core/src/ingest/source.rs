use crate::config::Settings;
use crate::ingest::normalize::{normalize_rows, DEFAULT_CURRENCY};
use crate::ingest::types::{IngestReport, RawCampaignRow};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Where the current campaign metrics come from.
#[async_trait::async_trait]
pub trait CampaignSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_records(&self) -> Result<IngestReport>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonCampaignSource {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    retries: u32,
    currency: String,
}

impl HttpJsonCampaignSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings.require_campaign_source_url()?.to_string();
        let api_key = settings.campaign_source_api_key.clone();

        let timeout_secs = std::env::var("CAMPAIGN_SOURCE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("CAMPAIGN_SOURCE_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build campaign source http client")?;

        Ok(Self {
            http,
            url,
            api_key,
            retries,
            currency: settings.display_currency.clone(),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self) -> Result<Vec<RawCampaignRow>> {
        let res = self
            .http
            .get(&self.url)
            .headers(self.headers()?)
            .send()
            .await
            .context("campaign source request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read campaign source response")?;

        if !status.is_success() {
            anyhow::bail!("campaign source HTTP {status}: {text}");
        }

        serde_json::from_str::<Vec<RawCampaignRow>>(&text)
            .context("campaign source response is not a JSON array of campaign rows")
    }
}

#[async_trait::async_trait]
impl CampaignSource for HttpJsonCampaignSource {
    fn source_name(&self) -> &'static str {
        "campaign_http_json"
    }

    async fn fetch_records(&self) -> Result<IngestReport> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(rows) => return Ok(normalize_rows(&rows, &self.currency)),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(
                        attempt,
                        ?backoff,
                        error = %err,
                        "campaign source fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Doubling delay after the `attempt`-th failure: 1s, 2s, 4s, ... capped at 64s.
fn retry_backoff(attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
    Duration::from_secs(1u64 << shift)
}

/// Reads a JSON array of campaign rows from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileCampaignSource {
    path: PathBuf,
    currency: String,
}

impl FileCampaignSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

#[async_trait::async_trait]
impl CampaignSource for FileCampaignSource {
    fn source_name(&self) -> &'static str {
        "campaign_file"
    }

    async fn fetch_records(&self) -> Result<IngestReport> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read campaign rows from {}", self.path.display()))?;
        let rows = serde_json::from_slice::<Vec<RawCampaignRow>>(&bytes).with_context(|| {
            format!("{} is not a JSON array of campaign rows", self.path.display())
        })?;
        Ok(normalize_rows(&rows, &self.currency))
    }
}
