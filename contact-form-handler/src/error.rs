use crate::{
    mailer::DispatchError, payload::ExtractionError, recaptcha::RecaptchaError,
    response::ResponseEnvelope, validation::ValidationError,
};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{error, warn};

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error, please try again later";
pub const INTERNAL_ERROR_LABEL: &str = "Internal server error";
pub const RECAPTCHA_FAILED_MESSAGE: &str = "reCAPTCHA failed";
pub const RECAPTCHA_FAILED_LABEL: &str = "Invalid reCAPTCHA";
pub const VALIDATION_FAILED_LABEL: &str = "Invalid submission";

#[derive(Debug, Error)]
pub enum ContactFormError {
    #[error("Could not extract submission: {0}")]
    Extraction(ExtractionError),
    #[error("Invalid submission at '{}': {0}", .0.instance_path())]
    Validation(#[from] ValidationError),
    #[error("reCAPTCHA token rejected")]
    RecaptchaRejected,
    #[error("reCAPTCHA verification failed: {0}")]
    RecaptchaUnavailable(#[from] RecaptchaError),
    #[error("Could not dispatch mail: {0}")]
    Dispatch(#[from] DispatchError),
}

impl From<ExtractionError> for ContactFormError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::Schema(error) => ContactFormError::Validation(error),
            error => ContactFormError::Extraction(error),
        }
    }
}

impl ContactFormError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ContactFormError::Validation(_)
            | ContactFormError::RecaptchaRejected
            | ContactFormError::RecaptchaUnavailable(_) => StatusCode::BAD_REQUEST,
            ContactFormError::Extraction(_) | ContactFormError::Dispatch(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn log(&self) {
        match self {
            ContactFormError::Extraction(_) | ContactFormError::Dispatch(_) => {
                error!("Internal error sending contact form email: {self}");
            }
            ContactFormError::Validation(_)
            | ContactFormError::RecaptchaRejected
            | ContactFormError::RecaptchaUnavailable(_) => {
                warn!("Client error sending contact form email: {self}");
            }
        }
    }

    /// Only validation messages reach the client verbatim. Everything else is replaced by a fixed
    /// message so that no internal detail leaks.
    pub fn into_response(self) -> ResponseEnvelope {
        let status = self.status_code();
        match self {
            ContactFormError::Validation(error) => {
                ResponseEnvelope::error(status, &error.to_string(), VALIDATION_FAILED_LABEL)
            }
            ContactFormError::RecaptchaRejected | ContactFormError::RecaptchaUnavailable(_) => {
                ResponseEnvelope::error(status, RECAPTCHA_FAILED_MESSAGE, RECAPTCHA_FAILED_LABEL)
            }
            ContactFormError::Extraction(_) | ContactFormError::Dispatch(_) => {
                ResponseEnvelope::error(status, INTERNAL_ERROR_MESSAGE, INTERNAL_ERROR_LABEL)
            }
        }
    }
}
