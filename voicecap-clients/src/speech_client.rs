//! SpeechClient (spec §4.H): external speech-to-text API adapter.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use voicecap_core::error::{CoreError, ErrorCategory};

const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, thiserror::Error)]
pub enum SpeechClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited by speech API")]
    RateLimited,
    #[error("speech API unavailable: {0}")]
    Unavailable(String),
    #[error("invalid audio payload: {0}")]
    InvalidInput(String),
    #[error("speech API call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<SpeechClientError> for CoreError {
    fn from(err: SpeechClientError) -> Self {
        let category = match &err {
            SpeechClientError::RateLimited => ErrorCategory::RateLimited,
            SpeechClientError::Unavailable(_) | SpeechClientError::Http(_) => ErrorCategory::Unavailable,
            SpeechClientError::InvalidInput(_) => ErrorCategory::InvalidInput,
            SpeechClientError::Timeout(_) => ErrorCategory::Timeout,
        };
        CoreError::new(category, err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    codec_hint: &'a str,
    #[serde(with = "serde_bytes_base64")]
    audio_base64: &'a [u8],
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

#[derive(Clone)]
pub struct SpeechClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SpeechClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(TRANSCRIBE_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Empty text is a legitimate outcome (silent audio), not an error
    /// (spec §4.H).
    pub async fn transcribe(&self, bytes: &[u8], codec_hint: &str) -> Result<String, SpeechClientError> {
        let url = format!("{}/v1/transcribe", self.base_url);
        let request = TranscribeRequest {
            codec_hint,
            audio_base64: bytes,
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
                    SpeechClientError::Timeout(TRANSCRIBE_TIMEOUT)
                } else {
                    SpeechClientError::Http(e)
                }
            })?;

        match response.status() {
            StatusCode::OK => {
                let body: TranscribeResponse = response.json().await?;
                Ok(body.text)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(SpeechClientError::RateLimited),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let detail = response.text().await.unwrap_or_default();
                Err(SpeechClientError::InvalidInput(detail))
            }
            status if status.is_server_error() => {
                Err(SpeechClientError::Unavailable(format!("HTTP {status}")))
            }
            status => Err(SpeechClientError::Unavailable(format!("unexpected HTTP {status}"))),
        }
    }
}

mod serde_bytes_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &&[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }
}
