//! SummaryClient (spec §4.I): external LLM call producing a structured
//! daily-summary body.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use voicecap_core::error::{CoreError, ErrorCategory};

const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum SummaryClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited by summary API")]
    RateLimited,
    #[error("summary API unavailable: {0}")]
    Unavailable(String),
    #[error("summary API call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<SummaryClientError> for CoreError {
    fn from(err: SummaryClientError) -> Self {
        let category = match &err {
            SummaryClientError::RateLimited => ErrorCategory::RateLimited,
            SummaryClientError::Unavailable(_) | SummaryClientError::Http(_) => ErrorCategory::Unavailable,
            SummaryClientError::Timeout(_) => ErrorCategory::Timeout,
        };
        CoreError::new(category, err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    prompt_template: &'a str,
    transcripts: &'a str,
}

#[derive(Debug, Deserialize)]
struct SummarizeApiResponse {
    family: Vec<String>,
    business: Vec<String>,
    misc: Vec<String>,
    tokens_in: u64,
    tokens_out: u64,
}

/// Structured summary output (spec §4.I contract).
#[derive(Debug, Clone, Default)]
pub struct SummaryResult {
    pub family: Vec<String>,
    pub business: Vec<String>,
    pub misc: Vec<String>,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

impl From<SummarizeApiResponse> for SummaryResult {
    fn from(r: SummarizeApiResponse) -> Self {
        Self {
            family: r.family,
            business: r.business,
            misc: r.misc,
            tokens_in: r.tokens_in,
            tokens_out: r.tokens_out,
        }
    }
}

#[derive(Clone)]
pub struct SummaryClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SummaryClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(SUMMARIZE_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Returns an all-empty result when `concatenated_transcripts` is empty
    /// rather than calling out (spec §4.L DailySummary step 4 "no activity").
    pub async fn summarize(
        &self,
        concatenated_transcripts: &str,
        prompt_template: &str,
    ) -> Result<SummaryResult, SummaryClientError> {
        if concatenated_transcripts.is_empty() {
            return Ok(SummaryResult::default());
        }

        let url = format!("{}/v1/summarize", self.base_url);
        let request = SummarizeRequest {
            prompt_template,
            transcripts: concatenated_transcripts,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SummaryClientError::Timeout(SUMMARIZE_TIMEOUT)
                } else {
                    SummaryClientError::Http(e)
                }
            })?;

        match response.status() {
            StatusCode::OK => {
                let body: SummarizeApiResponse = response.json().await?;
                Ok(body.into())
            }
            StatusCode::TOO_MANY_REQUESTS => Err(SummaryClientError::RateLimited),
            status if status.is_server_error() => {
                Err(SummaryClientError::Unavailable(format!("HTTP {status}")))
            }
            status => Err(SummaryClientError::Unavailable(format!("unexpected HTTP {status}"))),
        }
    }
}
