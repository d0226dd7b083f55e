pub mod config;
pub mod error;
pub mod handler;
pub mod mailer;
pub mod payload;
pub mod recaptcha;
pub mod response;
pub mod secrets;
pub mod validation;

pub use config::HandlerConfig;
pub use error::ContactFormError;
pub use handler::ContactFormHandler;
pub use mailer::{MailDispatcher, MailTransport, SmtpMailTransport};
pub use payload::{extract_submission, ContactFormSubmission, SubmissionRequest};
pub use response::ResponseEnvelope;
pub use secrets::{AwsSecretsManagerSecretRepository, SecretRepository};
pub use validation::{SchemaValidator, ValidatedSubmission};
