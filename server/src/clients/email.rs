use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    /// Address resolution belongs to the sender; the core only knows user ids.
    pub recipient: Uuid,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
#[error("email delivery failed: {0}")]
pub struct EmailError(pub String);

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, email: &Email) -> Result<(), EmailError>;
}

#[derive(Debug, Clone, Default)]
pub struct NoopEmailSender;

#[async_trait]
impl EmailSender for NoopEmailSender {
    async fn send_email(&self, email: &Email) -> Result<(), EmailError> {
        info!(recipient = %email.recipient, subject = %email.subject, "Sending email");
        Ok(())
    }
}
