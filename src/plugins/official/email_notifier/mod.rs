// src/plugins/official/email_notifier/mod.rs
mod mailer;
mod notifier;

pub use mailer::{MailError, Mailer, OutgoingMail, SmtpMailer, RECIPIENT_NAME};
pub use notifier::{EmailNotifier, PLUGIN_NAME, PLUGIN_VERSION};
