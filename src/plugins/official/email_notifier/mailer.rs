// src/plugins/official/email_notifier/mailer.rs
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::plugins::payload::ResponseNotice;
use crate::utils::config::SmtpSettings;

pub const RECIPIENT_NAME: &str = "Survey owner";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("smtp transport error: {0}")]
    Transport(String),
}

/// A fully rendered notification, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub fn response_notice(from: &str, notice: &ResponseNotice) -> Self {
        let title = notice.survey_title();
        Self {
            from: from.to_string(),
            to: notice.creator_email().to_string(),
            to_name: RECIPIENT_NAME.to_string(),
            subject: format!("Your survey \"{}\" received a new response", title),
            body: format!(
                "Hello,\n\nYour survey \"{}\" has just received a new response.\n\
                 Sign in to view the submitted answers.\n",
                title
            ),
        }
    }

    pub fn to_message(&self) -> Result<Message, MailError> {
        let from = parse_mailbox(&self.from)?;
        let to = Mailbox::new(Some(self.to_name.clone()), parse_address(&self.to)?);

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

pub fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn parse_address(address: &str) -> Result<Address, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// STARTTLS relay with username/password authentication.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpSettings, port: u16) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = mail.to_message()?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}
