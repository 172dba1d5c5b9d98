use async_trait::async_trait;
use aws_config::BehaviorVersion;
use serde::de::DeserializeOwned;
use std::fmt::Display;

#[async_trait]
pub trait SecretRepository {
    async fn open() -> Self;

    async fn get_secret<T: DeserializeOwned>(&self, name: &str) -> Result<T, lambda_http::Error>;
}

pub struct AwsSecretsManagerSecretRepository(aws_sdk_secretsmanager::Client);

#[async_trait]
impl SecretRepository for AwsSecretsManagerSecretRepository {
    async fn open() -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Ok(url) = std::env::var("AWS_ENDPOINT_URL") {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        let secrets_client = aws_sdk_secretsmanager::Client::new(&config);
        Self(secrets_client)
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &str) -> Result<T, lambda_http::Error> {
        let secret = self.0.get_secret_value().secret_id(name).send().await?;
        let Some(secret_value) = secret.secret_string() else {
            return Err(Box::new(SecretError::MissingSecretString(name.into())));
        };
        Ok(serde_json::from_str(secret_value)?)
    }
}

#[derive(Debug)]
pub enum SecretError {
    MissingSecretString(String),
}

impl Display for SecretError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretError::MissingSecretString(name) => write!(f, "Secret {name} has no string value"),
        }
    }
}

impl std::error::Error for SecretError {}

#[cfg(test)]
pub mod test_support {
    use super::SecretRepository;
    use crate::settings::{RECAPTCHA_SECRET_KEY, SMTP_PASSWORD};
    use async_trait::async_trait;
    use serde::de::DeserializeOwned;
    use std::{collections::HashMap, fmt::Display};

    pub const FAKE_SECRET_NAME: &str = "contact-form-secrets";

    pub struct FakeSecretRepository(HashMap<&'static str, String>);

    #[async_trait]
    impl SecretRepository for FakeSecretRepository {
        async fn open() -> Self {
            Self(HashMap::from([(
                FAKE_SECRET_NAME,
                format!(
                    r#"{{
                        "{SMTP_PASSWORD}": "password from secret",
                        "{RECAPTCHA_SECRET_KEY}": "recaptcha secret from secret"
                    }}"#
                ),
            )]))
        }

        async fn get_secret<T: DeserializeOwned>(
            &self,
            name: &str,
        ) -> std::result::Result<T, lambda_http::Error> {
            let string_value = self
                .0
                .get(name)
                .ok_or_else(|| SecretNotFound(name.into()))?;
            Ok(serde_json::from_str(string_value)?)
        }
    }

    #[derive(Debug)]
    pub struct SecretNotFound(String);

    impl Display for SecretNotFound {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "No such secret {}", self.0)
        }
    }

    impl std::error::Error for SecretNotFound {}
}
