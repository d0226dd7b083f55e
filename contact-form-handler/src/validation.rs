use crate::payload::{Attachment, ContactFormSubmission};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use thiserror::Error;

/// The fields every submission must carry, in the order in which violations are reported.
pub const REQUIRED_FIELDS: [&str; 5] = ["name", "email", "subject", "message", "recaptcha"];

// The `email` format as checked by JSON schema validators. Matched case-insensitively over ASCII
// only: Unicode case folding would let `ſ` and the Kelvin sign through as `s` and `k`.
const EMAIL_PATTERN: &str = r"^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$";

pub struct SchemaValidator {
    email_pattern: Regex,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            email_pattern: RegexBuilder::new(EMAIL_PATTERN)
                .case_insensitive(true)
                .unicode(false)
                .build()
                .expect("email pattern is a valid regex"),
        }
    }

    /// Checks the submission against the contact form schema.
    ///
    /// Presence of every required field is checked before any type or format check, so a
    /// submission with a missing `subject` and a malformed `email` reports the missing field.
    pub fn validate<'a>(
        &self,
        submission: &'a ContactFormSubmission,
    ) -> Result<ValidatedSubmission<'a>, ValidationError> {
        let fields = Self::schema_fields(submission);
        if let Some((field, _)) = fields.iter().find(|(_, value)| value.is_none()) {
            return Err(ValidationError::MissingProperty(*field));
        }

        let [name, email, subject, message, recaptcha] = fields;
        let name = Self::string_field(name)?;
        let email = Self::string_field(email)?;
        if !self.email_pattern.is_match(email) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                format: "email",
            });
        }
        let subject = Self::string_field(subject)?;
        let message = Self::string_field(message)?;
        let recaptcha = Self::string_field(recaptcha)?;

        Ok(ValidatedSubmission {
            name,
            email,
            subject,
            message,
            recaptcha,
            files: &submission.files,
        })
    }

    fn schema_fields(
        submission: &ContactFormSubmission,
    ) -> [(&'static str, Option<&Value>); 5] {
        let ContactFormSubmission {
            name,
            email,
            subject,
            message,
            recaptcha,
            files: _,
        } = submission;
        let values = [name, email, subject, message, recaptcha];
        std::array::from_fn(|index| (REQUIRED_FIELDS[index], values[index].as_ref()))
    }

    fn string_field<'a>(
        (field, value): (&'static str, Option<&'a Value>),
    ) -> Result<&'a str, ValidationError> {
        match value {
            Some(Value::String(value)) => Ok(value.as_str()),
            Some(_) => Err(ValidationError::NotAString(field)),
            None => Err(ValidationError::MissingProperty(field)),
        }
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValidatedSubmission<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub subject: &'a str,
    pub message: &'a str,
    pub recaptcha: &'a str,
    pub files: &'a [Attachment],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("must be object")]
    NotAnObject,
    #[error("must have required property '{0}'")]
    MissingProperty(&'static str),
    #[error("must be string")]
    NotAString(&'static str),
    #[error("must match format \"{format}\"")]
    InvalidFormat {
        field: &'static str,
        format: &'static str,
    },
}

impl ValidationError {
    /// JSON pointer to the offending value, as schema validators report it.
    pub fn instance_path(&self) -> String {
        match self {
            ValidationError::NotAnObject | ValidationError::MissingProperty(_) => String::new(),
            ValidationError::NotAString(field) | ValidationError::InvalidFormat { field, .. } => {
                format!("/{field}")
            }
        }
    }
}
