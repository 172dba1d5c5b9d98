use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// What the verification service said about a token.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    pub success: bool,
    /// reCAPTCHA v3 trust score in `[0.0, 1.0]`. Absent for v2 tokens.
    pub score: Option<f64>,
    pub error_codes: Vec<String>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, secret: &str, token: &str) -> anyhow::Result<VerificationOutcome>;
}

pub struct RecaptchaVerifier {
    client: Client,
    verify_url: String,
}

impl RecaptchaVerifier {
    pub fn new(verify_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            verify_url: verify_url.into(),
        }
    }
}

#[async_trait]
impl TokenVerifier for RecaptchaVerifier {
    async fn verify(&self, secret: &str, token: &str) -> anyhow::Result<VerificationOutcome> {
        let response: SiteverifyResponse = self
            .client
            .post(&self.verify_url)
            .form(&SiteverifyRequest {
                secret,
                response: token,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.into())
    }
}

#[derive(Serialize)]
struct SiteverifyRequest<'a> {
    secret: &'a str,
    response: &'a str,
}

#[derive(Deserialize)]
struct SiteverifyResponse {
    success: bool,
    score: Option<f64>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl From<SiteverifyResponse> for VerificationOutcome {
    fn from(value: SiteverifyResponse) -> Self {
        Self {
            success: value.success,
            score: value.score,
            error_codes: value.error_codes,
        }
    }
}
