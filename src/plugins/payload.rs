// src/plugins/payload.rs
//! Typed task payloads handed to `Plugin::execute`.
//!
//! Payloads are validated where they are built, so a plugin receiving a
//! `ResponseNotice` can rely on both fields being present and non-empty.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const CREATOR_EMAIL_KEY: &str = "creator_email";
pub const SURVEY_TITLE_KEY: &str = "survey_title";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// A survey received a new response; notify its creator.
    ResponseNotice(ResponseNotice),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawResponseNotice")]
pub struct ResponseNotice {
    creator_email: String,
    survey_title: String,
}

#[derive(Deserialize)]
struct RawResponseNotice {
    creator_email: String,
    survey_title: String,
}

impl ResponseNotice {
    pub fn new(
        creator_email: impl Into<String>,
        survey_title: impl Into<String>,
    ) -> Result<Self, PayloadError> {
        let creator_email = creator_email.into();
        let survey_title = survey_title.into();

        if creator_email.trim().is_empty() {
            return Err(PayloadError::MissingField(CREATOR_EMAIL_KEY));
        }
        if !creator_email.contains('@') {
            return Err(PayloadError::InvalidField {
                field: CREATOR_EMAIL_KEY,
                reason: format!("'{}' is not an email address", creator_email),
            });
        }
        if survey_title.trim().is_empty() {
            return Err(PayloadError::MissingField(SURVEY_TITLE_KEY));
        }

        Ok(Self {
            creator_email,
            survey_title,
        })
    }

    pub fn creator_email(&self) -> &str {
        &self.creator_email
    }

    pub fn survey_title(&self) -> &str {
        &self.survey_title
    }
}

impl TryFrom<RawResponseNotice> for ResponseNotice {
    type Error = PayloadError;

    fn try_from(raw: RawResponseNotice) -> Result<Self, Self::Error> {
        Self::new(raw.creator_email, raw.survey_title)
    }
}

impl TaskPayload {
    pub fn response_notice(
        creator_email: impl Into<String>,
        survey_title: impl Into<String>,
    ) -> Result<Self, PayloadError> {
        ResponseNotice::new(creator_email, survey_title).map(TaskPayload::ResponseNotice)
    }

    /// Builds a payload from the loosely typed key/value form used by older
    /// callers (`creator_email`, `survey_title`).
    pub fn from_params(params: &HashMap<String, Value>) -> Result<Self, PayloadError> {
        let creator_email = string_field(params, CREATOR_EMAIL_KEY)?;
        let survey_title = string_field(params, SURVEY_TITLE_KEY)?;
        Self::response_notice(creator_email, survey_title)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskPayload::ResponseNotice(_) => "response_notice",
        }
    }
}

impl fmt::Display for TaskPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPayload::ResponseNotice(notice) => write!(
                f,
                "response_notice(to={}, title={})",
                notice.creator_email, notice.survey_title
            ),
        }
    }
}

fn string_field<'a>(
    params: &'a HashMap<String, Value>,
    field: &'static str,
) -> Result<&'a str, PayloadError> {
    match params.get(field) {
        None | Some(Value::Null) => Err(PayloadError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(PayloadError::InvalidField {
            field,
            reason: format!("expected string, got {}", other),
        }),
    }
}
