//! Turns the raw Lambda proxy event into a [`ContactFormSubmission`].
//!
//! Two body encodings are understood: a JSON object and `multipart/form-data`. Either may arrive
//! base64-encoded, in which case the proxy sets `isBase64Encoded`.

use crate::validation::ValidationError;
use base64::{engine::general_purpose::STANDARD, Engine};
use multer::Multipart;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::{collections::HashMap, convert::Infallible};
use thiserror::Error;
use tracing::debug;

const MULTIPART_FORM_DATA: &str = "multipart/form-data";
const DEFAULT_ATTACHMENT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl SubmissionRequest {
    /// Routers are inconsistent about header casing, so any casing of `Content-Type` matches.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .flatten()
            .find(|(key, _)| key.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }

    fn decoded_body(&self) -> Result<Vec<u8>, ExtractionError> {
        let body = self.body.as_deref().unwrap_or_default();
        if self.is_base64_encoded {
            Ok(STANDARD.decode(body)?)
        } else {
            Ok(body.as_bytes().to_vec())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// The submission as sent by the client, before any schema checks.
///
/// Fields are kept as raw JSON values so that the validator can tell an absent field from one of
/// the wrong type.
#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct ContactFormSubmission {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub subject: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub message: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub recaptcha: Option<Value>,
    #[serde(skip)]
    pub files: Vec<Attachment>,
}

// Keeps an explicit `null` as `Some(Value::Null)` instead of collapsing it into `None`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl ContactFormSubmission {
    fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "subject" => &mut self.subject,
            "message" => &mut self.message,
            "recaptcha" => &mut self.recaptcha,
            _ => {
                debug!("Ignoring unknown form field {name}");
                return;
            }
        };
        *slot = Some(Value::String(value));
    }
}

pub async fn extract_submission(
    request: &SubmissionRequest,
) -> Result<ContactFormSubmission, ExtractionError> {
    let body = request.decoded_body()?;
    match request.content_type() {
        Some(content_type) if is_multipart(content_type) => {
            extract_multipart(content_type, body).await
        }
        _ => extract_json(&body),
    }
}

// A derived struct visitor would also fill fields positionally from a JSON array, so anything but
// an object is turned away before deserializing.
fn extract_json(body: &[u8]) -> Result<ContactFormSubmission, ExtractionError> {
    match serde_json::from_slice::<Value>(body)? {
        fields @ Value::Object(_) => Ok(serde_json::from_value(fields)?),
        _ => Err(ValidationError::NotAnObject.into()),
    }
}

fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with(MULTIPART_FORM_DATA)
}

async fn extract_multipart(
    content_type: &str,
    body: Vec<u8>,
) -> Result<ContactFormSubmission, ExtractionError> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = Multipart::new(stream, boundary);
    let mut submission = ContactFormSubmission::default();

    while let Some(field) = multipart.next_field().await? {
        match field.file_name() {
            Some("") => {
                debug!("Skipping file part without a filename");
            }
            Some(filename) => {
                let filename = filename.to_owned();
                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .unwrap_or_else(|| DEFAULT_ATTACHMENT_CONTENT_TYPE.into());
                let content = field.bytes().await?.to_vec();
                submission.files.push(Attachment {
                    filename,
                    content_type,
                    content,
                });
            }
            None => {
                let Some(name) = field.name().map(str::to_owned) else {
                    continue;
                };
                let value = field.text().await?;
                submission.set_field(&name, value);
            }
        }
    }

    Ok(submission)
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid base64 body: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),
    /// The body is well-formed but cannot be a contact form submission.
    #[error("{0}")]
    Schema(#[from] ValidationError),
}
