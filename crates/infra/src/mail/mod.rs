//! Outgoing mail: the transport boundary and the template set.

pub mod templates;

use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

pub use templates::{MailTemplate, MailTemplates, TemplateKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub to: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("unknown mail template '{0}'")]
    UnknownTemplate(String),

    #[error("mail template error: {0}")]
    Template(String),

    #[error("malformed mail templates: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Records mail instead of sending it.
#[derive(Debug, Default)]
pub struct InMemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError::Transport("outbox lock poisoned".to_string()))?
            .push(mail);
        Ok(())
    }
}

/// Development transport: logs each mail and drops it.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            from = %self.from,
            to = %mail.to,
            subject = %mail.subject,
            cc = mail.cc.len(),
            bcc = mail.bcc.len(),
            "mail dispatched"
        );
        Ok(())
    }
}
