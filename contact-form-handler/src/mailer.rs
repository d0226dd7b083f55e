use crate::{
    config::HandlerConfig,
    payload::Attachment,
    secrets::{SecretError, SecretRepository},
    validation::ValidatedSubmission,
};
use async_once_cell::OnceCell;
use async_trait::async_trait;
use lettre::{
    address::AddressError,
    message::{
        header::{ContentType, ContentTypeErr},
        Attachment as AttachmentPart, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), DispatchError>;
}

pub struct SmtpMailTransport<SecretRepositoryT: SecretRepository> {
    smtp_url: String,
    credentials_name: String,
    secrets_repository: SecretRepositoryT,
    mailer: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl<SecretRepositoryT: SecretRepository> SmtpMailTransport<SecretRepositoryT> {
    pub fn new(config: &HandlerConfig, secrets_repository: SecretRepositoryT) -> Self {
        Self {
            smtp_url: config.smtp_url().into_owned(),
            credentials_name: config.smtp_credentials_name.clone(),
            secrets_repository,
            mailer: Default::default(),
        }
    }

    async fn initialise_mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DispatchError> {
        info!("initialise_mailer: Connecting to {}", self.smtp_url);
        // Credentials are only ever sent over TLS. A plain smtp:// URL is for local testing and
        // the server is expected to accept mail without authentication.
        let credentials = if self.smtp_url.starts_with("smtps://") {
            let parsed_credentials: SmtpCredentials = self
                .secrets_repository
                .get_secret(&self.credentials_name)
                .await?;
            Some(Credentials::new(
                parsed_credentials.username,
                parsed_credentials.password,
            ))
        } else {
            None
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&self.smtp_url)?
            .authentication(vec![Mechanism::Plain]);
        if let Some(credentials) = credentials {
            builder = builder.credentials(credentials);
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl<SecretRepositoryT: SecretRepository> MailTransport for SmtpMailTransport<SecretRepositoryT> {
    async fn send(&self, message: Message) -> Result<(), DispatchError> {
        let mailer = self
            .mailer
            .get_or_try_init(self.initialise_mailer())
            .await?;
        mailer.send(message).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct SmtpCredentials {
    #[serde(rename = "SMTP_USERNAME")]
    username: String,
    #[serde(rename = "SMTP_PASSWORD")]
    password: String,
}

/// Composes the outgoing message for a submission and hands it to a [`MailTransport`].
pub struct MailDispatcher<TransportT: MailTransport> {
    sender: Mailbox,
    recipient: Mailbox,
    disable_send: bool,
    transport: TransportT,
}

impl<TransportT: MailTransport> MailDispatcher<TransportT> {
    pub fn new(config: &HandlerConfig, transport: TransportT) -> Self {
        Self {
            sender: config.sender.clone(),
            recipient: config.recipient.clone(),
            disable_send: config.disable_send,
            transport,
        }
    }

    pub fn transport(&self) -> &TransportT {
        &self.transport
    }

    pub async fn dispatch(&self, submission: &ValidatedSubmission<'_>) -> Result<(), DispatchError> {
        let message = self.compose(submission)?;
        if self.disable_send {
            info!(
                "Sending disabled, dropping message \"{}\" from {}",
                submission.subject, submission.email
            );
            return Ok(());
        }
        self.transport.send(message).await
    }

    /// Only the filename and bytes of each attachment are forwarded. The MIME type of the part is
    /// guessed from the filename rather than taken from the submission.
    pub fn compose(&self, submission: &ValidatedSubmission) -> Result<Message, DispatchError> {
        let reply_to = Mailbox::new(Some(submission.name.into()), submission.email.parse()?);
        let builder = Message::builder()
            .from(self.sender.clone())
            .reply_to(reply_to)
            .to(self.recipient.clone())
            .subject(submission.subject);

        if submission.files.is_empty() {
            return Ok(builder
                .header(ContentType::TEXT_PLAIN)
                .body(submission.message.to_string())?);
        }

        let mut body =
            MultiPart::mixed().singlepart(SinglePart::plain(submission.message.to_string()));
        for file in submission.files {
            body = body.singlepart(Self::attachment_part(file)?);
        }
        Ok(builder.multipart(body)?)
    }

    fn attachment_part(file: &Attachment) -> Result<SinglePart, DispatchError> {
        let mime = mime_guess::from_path(&file.filename).first_or_octet_stream();
        let content_type = ContentType::parse(mime.essence_str())?;
        Ok(AttachmentPart::new(file.filename.clone()).body(file.content.clone(), content_type))
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid reply-to address: {0}")]
    Address(#[from] AddressError),
    #[error("Invalid attachment content type: {0}")]
    ContentType(#[from] ContentTypeErr),
    #[error("Error building message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("Unable to retrieve SMTP credentials: {0}")]
    Secret(#[from] SecretError),
    #[error("Error sending message: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[cfg(test)]
pub mod test_support {
    use super::{DispatchError, MailTransport};
    use crate::secrets::SecretError;
    use async_trait::async_trait;
    use lettre::Message;
    use std::sync::Mutex;

    /// Keeps every message handed to it instead of delivering it.
    #[derive(Default)]
    pub struct RecordingMailTransport {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingMailTransport {
        pub fn failing() -> Self {
            Self {
                sent: Default::default(),
                fail: true,
            }
        }

        pub fn sent_messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailTransport for RecordingMailTransport {
        async fn send(&self, message: Message) -> Result<(), DispatchError> {
            if self.fail {
                return Err(DispatchError::Secret(SecretError::MissingSecret(
                    "smtp-ses-credentials".into(),
                )));
            }
            self.sent
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&message.formatted()).into_owned());
            Ok(())
        }
    }
}
