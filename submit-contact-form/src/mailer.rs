use crate::settings::RelaySettings;
use anyhow::anyhow;
use async_trait::async_trait;
use lettre::{
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        AsyncSmtpTransportBuilder,
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use tracing::debug;

/// Port on which relays expect TLS from the first byte rather than via STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends the message once and returns its `Message-ID`.
    async fn send(&self, message: Message) -> anyhow::Result<String>;
}

pub struct SmtpMailer(AsyncSmtpTransport<Tokio1Executor>);

impl SmtpMailer {
    pub fn new(
        relay: &RelaySettings,
        timeout: Duration,
    ) -> Result<Self, lettre::transport::smtp::Error> {
        let transport = transport_builder(&relay.host, relay.port)?
            .credentials(Credentials::new(
                relay.username.clone(),
                relay.password.clone(),
            ))
            .timeout(Some(timeout))
            .build();
        Ok(Self(transport))
    }

    #[cfg(test)]
    pub(crate) fn unauthenticated(
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Self, lettre::transport::smtp::Error> {
        Ok(Self(
            transport_builder(host, port)?.timeout(Some(timeout)).build(),
        ))
    }
}

fn transport_builder(
    host: &str,
    port: u16,
) -> Result<AsyncSmtpTransportBuilder, lettre::transport::smtp::Error> {
    let builder = if port == IMPLICIT_TLS_PORT {
        AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
    } else {
        // Credentials go out in the clear if the relay does not offer STARTTLS.
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .tls(Tls::Opportunistic(TlsParameters::new(host.into())?))
    };
    Ok(builder.port(port))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: Message) -> anyhow::Result<String> {
        let message_id = message
            .headers()
            .get_raw("Message-ID")
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("Message has no Message-ID header"))?;
        let response = self.0.send(message).await?;
        debug!(
            "Relay accepted {message_id}: {}",
            response.message().collect::<Vec<_>>().join(" ")
        );
        Ok(message_id)
    }
}
