// src/plugins/official/mod.rs
pub mod email_notifier;

pub use email_notifier::EmailNotifier;
