use crate::secrets::SecretRepository;
use lettre::message::Mailbox;
use std::{collections::HashMap, fmt::Display, time::Duration};
use tracing::{info, warn};

pub const RECAPTCHA_SECRET_KEY: &str = "RECAPTCHA_SECRET_KEY";
pub const RECAPTCHA_MIN_SCORE: &str = "RECAPTCHA_MIN_SCORE";
pub const RECAPTCHA_VERIFY_URL: &str = "RECAPTCHA_VERIFY_URL";
pub const RECIPIENT_EMAIL: &str = "RECIPIENT_EMAIL";
pub const SMTP_HOST: &str = "SMTP_HOST";
pub const SMTP_PORT: &str = "SMTP_PORT";
pub const SMTP_USER: &str = "SMTP_USER";
pub const SMTP_PASSWORD: &str = "SMTP_PASSWORD";
pub const SMTP_FROM: &str = "SMTP_FROM";
pub const EXTERNAL_CALL_TIMEOUT_SECS: &str = "EXTERNAL_CALL_TIMEOUT_SECS";

/// Names an AWS Secrets Manager secret whose JSON keys override the environment.
pub const CONTACT_FORM_SECRETS: &str = "CONTACT_FORM_SECRETS";

const DEFAULT_RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
const DEFAULT_MIN_SCORE: f64 = 0.5;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Settings {
    pub verification: Option<VerificationSettings>,
    pub mail: Option<MailSettings>,
    pub call_timeout: Duration,
}

pub struct VerificationSettings {
    pub secret_key: String,
    pub verify_url: String,
    pub min_score: f64,
}

pub struct MailSettings {
    pub recipient: Mailbox,
    pub sender: Mailbox,
    pub relay: RelaySettings,
}

pub struct RelaySettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Reads the settings from the process environment, overlaid by the secret named in
/// [`CONTACT_FORM_SECRETS`] if there is one.
pub async fn load<SecretRepositoryT: SecretRepository>() -> Result<Settings, lambda_http::Error> {
    resolve::<SecretRepositoryT>(std::env::vars().collect()).await
}

async fn resolve<SecretRepositoryT: SecretRepository>(
    mut values: HashMap<String, String>,
) -> Result<Settings, lambda_http::Error> {
    if let Some(secret_name) = values
        .get(CONTACT_FORM_SECRETS)
        .filter(|name| !name.trim().is_empty())
        .cloned()
    {
        info!("Loading configuration overrides from secret {secret_name}");
        let repository = SecretRepositoryT::open().await;
        let overrides: HashMap<String, String> = repository.get_secret(&secret_name).await?;
        values.extend(overrides);
    }
    Ok(Settings::from_values(&values)?)
}

impl Settings {
    pub fn from_values(values: &HashMap<String, String>) -> Result<Self, SettingsError> {
        // Credentials are passed on untrimmed; whitespace-only values count as absent.
        let get = |name: &str| {
            values
                .get(name)
                .map(String::as_str)
                .filter(|value| !value.trim().is_empty())
        };

        let verification = match get(RECAPTCHA_SECRET_KEY) {
            Some(secret_key) => Some(VerificationSettings {
                secret_key: secret_key.into(),
                verify_url: get(RECAPTCHA_VERIFY_URL)
                    .map(str::trim)
                    .unwrap_or(DEFAULT_RECAPTCHA_VERIFY_URL)
                    .into(),
                min_score: match get(RECAPTCHA_MIN_SCORE) {
                    Some(value) => parse_score(value.trim())?,
                    None => DEFAULT_MIN_SCORE,
                },
            }),
            None => None,
        };

        let mail = match (
            get(RECIPIENT_EMAIL),
            get(SMTP_HOST),
            get(SMTP_USER),
            get(SMTP_PASSWORD),
        ) {
            (Some(recipient), Some(host), Some(username), Some(password)) => {
                let port = match get(SMTP_PORT).map(str::trim) {
                    Some(value) => value.parse().map_err(|_| SettingsError::InvalidValue {
                        name: SMTP_PORT,
                        value: value.into(),
                        reason: "expected a port number",
                    })?,
                    None => DEFAULT_SMTP_PORT,
                };
                let sender = match get(SMTP_FROM) {
                    Some(from) => Some(parse_mailbox(SMTP_FROM, from)?),
                    None => default_sender(username),
                };
                match sender {
                    Some(sender) => Some(MailSettings {
                        recipient: parse_mailbox(RECIPIENT_EMAIL, recipient)?,
                        sender,
                        relay: RelaySettings {
                            host: host.trim().into(),
                            port,
                            username: username.into(),
                            password: password.into(),
                        },
                    }),
                    None => None,
                }
            }
            _ => None,
        };

        let call_timeout = match get(EXTERNAL_CALL_TIMEOUT_SECS).map(str::trim) {
            Some(value) => value
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| SettingsError::InvalidValue {
                    name: EXTERNAL_CALL_TIMEOUT_SECS,
                    value: value.into(),
                    reason: "expected a whole number of seconds",
                })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            verification,
            mail,
            call_timeout,
        })
    }

    pub fn log_summary(&self) {
        match &self.verification {
            Some(verification) => info!(
                "reCAPTCHA verification enabled with minimum score {}",
                verification.min_score
            ),
            None => warn!("{RECAPTCHA_SECRET_KEY} not set; submissions are not verified"),
        }
        match &self.mail {
            Some(mail) => info!(
                "Relaying submissions to {} via {}:{}",
                mail.recipient, mail.relay.host, mail.relay.port
            ),
            None => warn!("SMTP settings incomplete; submissions are only logged"),
        }
    }
}

fn parse_score(value: &str) -> Result<f64, SettingsError> {
    match value.parse::<f64>() {
        Ok(score) if (0.0..=1.0).contains(&score) => Ok(score),
        _ => Err(SettingsError::InvalidValue {
            name: RECAPTCHA_MIN_SCORE,
            value: value.into(),
            reason: "expected a number between 0 and 1",
        }),
    }
}

/// The relay username doubles as sender unless it is not an address, as with API-key style
/// relay accounts. Mail is then left unconfigured.
fn default_sender(username: &str) -> Option<Mailbox> {
    match username.trim().parse() {
        Ok(sender) => Some(sender),
        Err(_) => {
            warn!("{SMTP_USER} is not an email address and {SMTP_FROM} is not set; mail disabled");
            None
        }
    }
}

fn parse_mailbox(name: &'static str, value: &str) -> Result<Mailbox, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::InvalidValue {
        name,
        value: value.into(),
        reason: "expected an email address",
    })
}

#[derive(Debug)]
pub enum SettingsError {
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::InvalidValue {
                name,
                value,
                reason,
            } => write!(f, "Invalid value {value:?} for {name}: {reason}"),
        }
    }
}

impl std::error::Error for SettingsError {}
