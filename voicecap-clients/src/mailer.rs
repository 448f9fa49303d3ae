//! Mailer (spec §4.J): formatted email delivery via a transactional-email
//! API. One message per invocation.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use voicecap_core::error::{CoreError, ErrorCategory};

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sender not verified with the mail provider")]
    Unverified,
    #[error("rate limited by mail provider")]
    RateLimited,
    #[error("mail provider unavailable: {0}")]
    Unavailable(String),
}

impl From<MailerError> for CoreError {
    fn from(err: MailerError) -> Self {
        let category = match &err {
            MailerError::Unverified => ErrorCategory::Forbidden,
            MailerError::RateLimited => ErrorCategory::RateLimited,
            MailerError::Unavailable(_) | MailerError::Http(_) => ErrorCategory::Unavailable,
        };
        CoreError::new(category, err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: String,
}

#[derive(Clone)]
pub struct Mailer {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    sender: String,
}

impl Mailer {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            sender: sender.into(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<String, MailerError> {
        let url = format!("{}/v1/send", self.base_url);
        let request = SendRequest {
            from: &self.sender,
            to,
            subject,
            html_body,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let body: SendResponse = response.json().await?;
                Ok(body.message_id)
            }
            StatusCode::FORBIDDEN => Err(MailerError::Unverified),
            StatusCode::TOO_MANY_REQUESTS => Err(MailerError::RateLimited),
            status => Err(MailerError::Unavailable(format!("HTTP {status}"))),
        }
    }
}
