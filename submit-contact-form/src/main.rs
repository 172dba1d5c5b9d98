mod email_body;
mod mailer;
mod recaptcha;
mod secrets;
mod settings;

use email_body::render_email_body;
use lambda_http::{
    http::{Method, StatusCode},
    run, service_fn, Body, Error, Request, Response,
};
use lettre::{
    message::{Mailbox, MultiPart},
    Address, Message,
};
use mailer::{Mailer, SmtpMailer};
use recaptcha::{RecaptchaVerifier, TokenVerifier};
use regex::Regex;
use secrets::AwsSecretsManagerSecretRepository;
use serde::{Deserialize, Serialize};
use settings::Settings;
use std::{sync::OnceLock, time::Duration};
use tokio::time::timeout;
use tracing::{error, info, warn};

const MISSING_FIELDS_MESSAGE: &str = "All fields are required";
const VERIFICATION_FAILED_MESSAGE: &str = "reCAPTCHA verification failed. Please try again.";
const INVALID_EMAIL_MESSAGE: &str = "Invalid email address";
const INTERNAL_ERROR_MESSAGE: &str = "Failed to send email. Please try again later.";
const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";
const SENT_MESSAGE: &str = "Email sent successfully";
const NOT_CONFIGURED_MESSAGE: &str = "Message received (email not configured - check server logs)";
const NOT_CONFIGURED_WARNING: &str = "Please configure SMTP settings in the environment";

const SUBJECT_PREFIX: &str = "Contact Form: ";

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let settings = settings::load::<AwsSecretsManagerSecretRepository>().await?;
    settings.log_summary();
    let handler = ContactFormMessageHandler::from_settings(settings)?;
    run(service_fn(|event| handler.handle(event))).await
}

struct ContactFormMessageHandler<VerifierT: TokenVerifier, MailerT: Mailer> {
    verification: Option<TokenVerification<VerifierT>>,
    delivery: Option<MailDelivery<MailerT>>,
    call_timeout: Duration,
}

struct TokenVerification<VerifierT: TokenVerifier> {
    verifier: VerifierT,
    secret_key: String,
    min_score: f64,
}

struct MailDelivery<MailerT: Mailer> {
    mailer: MailerT,
    sender: Mailbox,
    recipient: Mailbox,
}

impl ContactFormMessageHandler<RecaptchaVerifier, SmtpMailer> {
    fn from_settings(settings: Settings) -> Result<Self, Error> {
        let verification = settings.verification.map(|verification| TokenVerification {
            verifier: RecaptchaVerifier::new(verification.verify_url),
            secret_key: verification.secret_key,
            min_score: verification.min_score,
        });
        let delivery = match settings.mail {
            Some(mail) => Some(MailDelivery {
                mailer: SmtpMailer::new(&mail.relay, settings.call_timeout)?,
                sender: mail.sender,
                recipient: mail.recipient,
            }),
            None => None,
        };
        Ok(Self {
            verification,
            delivery,
            call_timeout: settings.call_timeout,
        })
    }
}

impl<VerifierT: TokenVerifier, MailerT: Mailer> ContactFormMessageHandler<VerifierT, MailerT> {
    async fn handle(&self, event: Request) -> Result<Response<Body>, Error> {
        if event.method() != Method::POST {
            warn!("Rejecting {} request", event.method());
            return json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &ErrorBody {
                    error: METHOD_NOT_ALLOWED_MESSAGE,
                },
            );
        }
        match self.process_message(event.body()).await {
            Ok(outcome) => outcome.into_response(),
            Err(error) => {
                error.log();
                error.into_response()
            }
        }
    }

    async fn process_message(&self, body: &[u8]) -> Result<SubmissionOutcome, ContactFormError> {
        let message: ContactFormMessage = serde_json::from_slice(body).map_err(|error| {
            ContactFormError::InternalError(format!("Unable to parse request body: {error}"))
        })?;
        let validated_message = message.validate()?;
        self.verify_token(&validated_message).await?;
        let reply_to = validated_message.check_email_format()?;

        let Some(delivery) = &self.delivery else {
            info!(
                name = validated_message.name,
                email = validated_message.email,
                subject = validated_message.subject,
                body = validated_message.message,
                "Contact form submission (SMTP not configured)"
            );
            return Ok(SubmissionOutcome::NotConfigured);
        };

        let email = delivery.construct_email_message(&validated_message, reply_to)?;
        let message_id = self.send_email(delivery, email).await?;
        info!("Email sent: {message_id}");
        Ok(SubmissionOutcome::Sent { message_id })
    }

    async fn verify_token<'a>(
        &self,
        message: &ValidatedContactFormMessage<'a>,
    ) -> Result<(), ContactFormError> {
        let Some(verification) = &self.verification else {
            return Ok(());
        };
        let Some(token) = message.verification_token else {
            return Err(ContactFormError::VerificationFailed(
                "No verification token supplied".into(),
            ));
        };
        let outcome = match timeout(
            self.call_timeout,
            verification.verifier.verify(&verification.secret_key, token),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => {
                return Err(ContactFormError::InternalError(format!(
                    "Error contacting verification service: {error:#}"
                )))
            }
            Err(_) => {
                return Err(ContactFormError::VerificationFailed(format!(
                    "Verification service did not answer within {:?}",
                    self.call_timeout
                )))
            }
        };
        if !outcome.success {
            return Err(ContactFormError::VerificationFailed(format!(
                "Verification service rejected token: {:?}",
                outcome.error_codes
            )));
        }
        match outcome.score {
            Some(score) if score < verification.min_score => {
                Err(ContactFormError::VerificationFailed(format!(
                    "Score {score} is below threshold {}",
                    verification.min_score
                )))
            }
            _ => Ok(()),
        }
    }

    async fn send_email(
        &self,
        delivery: &MailDelivery<MailerT>,
        email: Message,
    ) -> Result<String, ContactFormError> {
        match timeout(self.call_timeout, delivery.mailer.send(email)).await {
            Ok(Ok(message_id)) => Ok(message_id),
            Ok(Err(error)) => Err(ContactFormError::InternalError(format!(
                "Error sending message: {error:#}"
            ))),
            Err(_) => Err(ContactFormError::InternalError(format!(
                "Mail relay did not answer within {:?}",
                self.call_timeout
            ))),
        }
    }
}

impl<MailerT: Mailer> MailDelivery<MailerT> {
    fn construct_email_message(
        &self,
        message: &ValidatedContactFormMessage,
        reply_to: Address,
    ) -> Result<Message, ContactFormError> {
        let body = render_email_body(
            message.name,
            message.email,
            message.subject,
            message.message,
        )
        .map_err(|error| {
            ContactFormError::InternalError(format!("Error rendering message: {error}"))
        })?;
        Message::builder()
            .from(self.sender.clone())
            .reply_to(Mailbox::new(None, reply_to))
            .to(self.recipient.clone())
            .subject(format!("{SUBJECT_PREFIX}{}", message.subject))
            .message_id(None)
            .multipart(MultiPart::alternative_plain_html(body.text, body.html))
            .map_err(|error| {
                ContactFormError::InternalError(format!("Error building message: {error}"))
            })
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ContactFormMessage {
    name: Option<String>,
    email: Option<String>,
    subject: Option<String>,
    message: Option<String>,
    #[serde(alias = "recaptchaToken")]
    verification_token: Option<String>,
}

impl ContactFormMessage {
    fn validate(&self) -> Result<ValidatedContactFormMessage, ContactFormError> {
        let (Some(name), Some(email), Some(subject), Some(message)) = (
            present(&self.name),
            present(&self.email),
            present(&self.subject),
            present(&self.message),
        ) else {
            return Err(ContactFormError::ClientError(MISSING_FIELDS_MESSAGE));
        };

        Ok(ValidatedContactFormMessage {
            name,
            email,
            subject,
            message,
            verification_token: present(&self.verification_token),
        })
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

struct ValidatedContactFormMessage<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
    verification_token: Option<&'a str>,
}

impl ValidatedContactFormMessage<'_> {
    fn check_email_format(&self) -> Result<Address, ContactFormError> {
        let pattern =
            EMAIL_PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
        if !pattern.is_match(self.email) {
            return Err(ContactFormError::ClientError(INVALID_EMAIL_MESSAGE));
        }
        self.email
            .parse()
            .map_err(|_| ContactFormError::ClientError(INVALID_EMAIL_MESSAGE))
    }
}

enum SubmissionOutcome {
    Sent { message_id: String },
    NotConfigured,
}

impl SubmissionOutcome {
    fn into_response(self) -> Result<Response<Body>, Error> {
        let body = match self {
            SubmissionOutcome::Sent { message_id } => SuccessBody {
                message: SENT_MESSAGE,
                message_id: Some(message_id),
                warning: None,
            },
            SubmissionOutcome::NotConfigured => SuccessBody {
                message: NOT_CONFIGURED_MESSAGE,
                message_id: None,
                warning: Some(NOT_CONFIGURED_WARNING),
            },
        };
        json_response(StatusCode::OK, &body)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessBody {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

fn json_response(status: StatusCode, body: &impl Serialize) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(body)?.into())?)
}

#[derive(Debug)]
enum ContactFormError {
    /// Caller mistake; the message is shown to the caller as is.
    ClientError(&'static str),
    /// Missing, rejected, low-scoring or timed out token. Only a uniform message is shown.
    VerificationFailed(String),
    InternalError(String),
}

impl ContactFormError {
    fn log(&self) {
        match self {
            ContactFormError::ClientError(description) => {
                warn!("Client error in contact form submission: {description}");
            }
            ContactFormError::VerificationFailed(description) => {
                warn!("reCAPTCHA verification failed: {description}");
            }
            ContactFormError::InternalError(description) => {
                error!("Contact form error: {description}");
            }
        }
    }

    fn into_response(self) -> Result<Response<Body>, Error> {
        let (status, error) = match self {
            ContactFormError::ClientError(description) => (StatusCode::BAD_REQUEST, description),
            ContactFormError::VerificationFailed(_) => {
                (StatusCode::BAD_REQUEST, VERIFICATION_FAILED_MESSAGE)
            }
            ContactFormError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
            }
        };
        json_response(status, &ErrorBody { error })
    }
}

impl std::fmt::Display for ContactFormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactFormError::ClientError(description) => write!(f, "Client error: {description}"),
            ContactFormError::VerificationFailed(description) => {
                write!(f, "Verification failed: {description}")
            }
            ContactFormError::InternalError(description) => {
                write!(f, "Internal error: {description}")
            }
        }
    }
}

impl std::error::Error for ContactFormError {}
