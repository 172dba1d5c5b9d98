use crate::transport::{
    SubmissionPayload, SubmissionTransport, SubmitError, TokenSource, CONTACT_FORM_ACTION,
};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum FormState {
    Idle,
    Sending,
    Success,
    /// Holds the message shown to the visitor.
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormFields {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// The contact form on the site. Each submit obtains a fresh bot-detection token and sends
/// exactly one request.
pub struct ContactForm<TransportT: SubmissionTransport, TokenSourceT: TokenSource> {
    transport: TransportT,
    /// `None` when the bot-detection widget failed to initialize.
    token_source: Option<TokenSourceT>,
    fields: FormFields,
    state: FormState,
}

impl<TransportT: SubmissionTransport, TokenSourceT: TokenSource>
    ContactForm<TransportT, TokenSourceT>
{
    pub fn new(transport: TransportT, token_source: Option<TokenSourceT>) -> Self {
        Self {
            transport,
            token_source,
            fields: FormFields::default(),
            state: FormState::Idle,
        }
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FormFields {
        &mut self.fields
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            FormState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn can_submit(&self) -> bool {
        matches!(self.state, FormState::Idle | FormState::Error(_))
    }

    pub async fn submit(&mut self) {
        if !self.can_submit() {
            return;
        }
        self.state = FormState::Sending;
        self.state = match self.send().await {
            Ok(()) => {
                self.fields = FormFields::default();
                FormState::Success
            }
            Err(error) => {
                warn!("Contact form submission failed: {error}");
                FormState::Error(error.user_message().into())
            }
        };
    }

    /// Returns to [`FormState::Idle`] after a successful submission.
    pub fn reset(&mut self) {
        if self.state == FormState::Success {
            self.state = FormState::Idle;
        }
    }

    async fn send(&self) -> Result<(), SubmitError> {
        let Some(token_source) = &self.token_source else {
            return Err(SubmitError::TokenUnavailable);
        };
        let verification_token = token_source
            .execute(CONTACT_FORM_ACTION)
            .await
            .map_err(SubmitError::Transport)?;
        let payload = SubmissionPayload {
            name: self.fields.name.clone(),
            email: self.fields.email.clone(),
            subject: self.fields.subject.clone(),
            message: self.fields.message.clone(),
            verification_token,
        };
        let receipt = self.transport.submit(&payload).await?;
        info!("Contact form submitted: {}", receipt.message);
        if let Some(warning) = receipt.warning {
            warn!("Submission endpoint warns: {warning}");
        }
        Ok(())
    }
}
