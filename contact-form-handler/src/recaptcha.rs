use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

pub struct RecaptchaVerifier {
    client: Client,
    secret: Option<String>,
    verify_url: String,
}

impl RecaptchaVerifier {
    pub fn new(secret: Option<String>, verify_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            secret,
            verify_url: verify_url.into(),
        }
    }

    /// Asks the verification service whether `token` is a valid solution.
    ///
    /// Without a configured secret, verification is disabled and every token passes.
    pub async fn verify_token(&self, token: &str) -> Result<bool, RecaptchaError> {
        let Some(secret) = self.secret.as_deref() else {
            debug!("No reCAPTCHA secret configured, letting request pass without verification.");
            return Ok(true);
        };
        let response = self.send_token(secret, token).await?;
        let response_body: RecaptchaResponse =
            response.json().await.map_err(RecaptchaError::Decode)?;
        if !response_body.success {
            warn!(
                "reCAPTCHA rejected token: {:?}",
                response_body.error_codes
            );
        }
        Ok(response_body.success)
    }

    async fn send_token(&self, secret: &str, token: &str) -> Result<Response, RecaptchaError> {
        self.client
            .post(&self.verify_url)
            .form(&RecaptchaVerifyPayload {
                secret,
                response: token,
            })
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(RecaptchaError::Request)
    }
}

#[derive(Serialize)]
struct RecaptchaVerifyPayload<'a> {
    secret: &'a str,
    response: &'a str,
}

#[derive(Deserialize)]
struct RecaptchaResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RecaptchaError {
    #[error("Error contacting reCAPTCHA: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Error decoding reCAPTCHA response: {0}")]
    Decode(#[source] reqwest::Error),
}
