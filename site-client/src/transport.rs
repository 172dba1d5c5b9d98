use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Path under which the site serves the submission endpoint.
pub const DEFAULT_ENDPOINT_PATH: &str = "/api/contact";

/// Action name reported to the bot-detection widget for contact form submissions.
pub const CONTACT_FORM_ACTION: &str = "contact_form";

const WIDGET_NOT_LOADED_MESSAGE: &str = "reCAPTCHA not loaded. Please refresh the page.";
const FALLBACK_REJECTION_MESSAGE: &str = "Failed to send message";
const TRANSPORT_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Seam to the third-party bot-detection widget running in the browser.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn execute(&self, action: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmitError>;
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub verification_token: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub message: String,
    pub message_id: Option<String>,
    pub warning: Option<String>,
}

#[derive(Deserialize)]
struct RejectionBody {
    error: Option<String>,
}

pub struct HttpSubmissionTransport {
    client: Client,
    endpoint_url: String,
}

impl HttpSubmissionTransport {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint_url: endpoint_url.into(),
        }
    }

    /// Transport for the endpoint served by the site at `origin`.
    pub fn for_origin(origin: &str) -> Self {
        Self::new(format!(
            "{}{DEFAULT_ENDPOINT_PATH}",
            origin.trim_end_matches('/')
        ))
    }
}

#[async_trait]
impl SubmissionTransport for HttpSubmissionTransport {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmitError> {
        let response = self
            .client
            .post(&self.endpoint_url)
            .json(payload)
            .send()
            .await
            .map_err(|error| SubmitError::Transport(error.into()))?;
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|error| SubmitError::Transport(error.into()));
        }
        let body: RejectionBody = response.json().await.map_err(|error| {
            SubmitError::Transport(anyhow!("Unreadable {status} response: {error}"))
        })?;
        Err(SubmitError::Rejected(
            body.error
                .filter(|error| !error.is_empty())
                .unwrap_or_else(|| FALLBACK_REJECTION_MESSAGE.into()),
        ))
    }
}

#[derive(Debug)]
pub enum SubmitError {
    /// The bot-detection widget never initialized.
    TokenUnavailable,
    /// The endpoint answered with a non-success status. Holds the message to show.
    Rejected(String),
    Transport(anyhow::Error),
}

impl SubmitError {
    /// The text shown to the visitor.
    pub fn user_message(&self) -> &str {
        match self {
            SubmitError::TokenUnavailable => WIDGET_NOT_LOADED_MESSAGE,
            SubmitError::Rejected(message) => message,
            SubmitError::Transport(_) => TRANSPORT_FAILURE_MESSAGE,
        }
    }
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::TokenUnavailable => write!(f, "Bot-detection widget not loaded"),
            SubmitError::Rejected(message) => write!(f, "Submission rejected: {message}"),
            SubmitError::Transport(error) => write!(f, "Transport failure: {error:#}"),
        }
    }
}

impl std::error::Error for SubmitError {}
