use crate::recaptcha::RECAPTCHA_VERIFY_URL;
use anyhow::{bail, Context};
use lettre::message::Mailbox;
use std::borrow::Cow;

pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_SMTP_CREDENTIALS_NAME: &str = "smtp-ses-credentials";

/// Settings shared by every request a handler instance processes.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub sender: Mailbox,
    pub recipient: Mailbox,
    pub region: String,
    pub recaptcha_secret: Option<String>,
    pub skip_recaptcha: bool,
    pub disable_send: bool,
    pub recaptcha_verify_url: String,
    pub smtp_credentials_name: String,
    smtp_url: Option<String>,
}

impl HandlerConfig {
    pub fn new(sender: Mailbox, recipient: Mailbox) -> Self {
        Self {
            sender,
            recipient,
            region: DEFAULT_REGION.into(),
            recaptcha_secret: None,
            skip_recaptcha: false,
            disable_send: false,
            recaptcha_verify_url: RECAPTCHA_VERIFY_URL.into(),
            smtp_credentials_name: DEFAULT_SMTP_CREDENTIALS_NAME.into(),
            smtp_url: None,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::new(
            mailbox(&lookup, "SENDER_EMAIL")?,
            mailbox(&lookup, "RECIPIENT_EMAIL")?,
        );
        if let Some(region) = lookup("REGION") {
            config.region = region;
        }
        config.recaptcha_secret = lookup("RECAPTCHA_SECRET").filter(|secret| !secret.is_empty());
        config.skip_recaptcha = flag(&lookup, "SKIP_RECAPTCHA")?;
        config.disable_send = flag(&lookup, "DISABLE_SEND")?;
        if let Some(url) = lookup("RECAPTCHA_VERIFY_URL") {
            config.recaptcha_verify_url = url;
        }
        if let Some(name) = lookup("SMTP_CREDENTIALS_NAME") {
            config.smtp_credentials_name = name;
        }
        config.smtp_url = lookup("SMTP_URL");
        Ok(config)
    }

    pub fn with_recaptcha_secret(self, secret: impl Into<String>) -> Self {
        Self {
            recaptcha_secret: Some(secret.into()),
            ..self
        }
    }

    pub fn with_skip_recaptcha(self, skip_recaptcha: bool) -> Self {
        Self {
            skip_recaptcha,
            ..self
        }
    }

    pub fn with_disable_send(self, disable_send: bool) -> Self {
        Self {
            disable_send,
            ..self
        }
    }

    pub fn with_recaptcha_verify_url(self, url: impl Into<String>) -> Self {
        Self {
            recaptcha_verify_url: url.into(),
            ..self
        }
    }

    pub fn with_smtp_url(self, url: impl Into<String>) -> Self {
        Self {
            smtp_url: Some(url.into()),
            ..self
        }
    }

    /// SES accepts SMTP submissions on a per-region endpoint.
    pub fn smtp_url(&self) -> Cow<'_, str> {
        match &self.smtp_url {
            Some(url) => Cow::Borrowed(url.as_str()),
            None => Cow::Owned(format!(
                "smtps://email-smtp.{}.amazonaws.com",
                self.region
            )),
        }
    }
}

fn mailbox(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Mailbox> {
    let value = lookup(key).with_context(|| format!("Missing environment variable {key}"))?;
    value
        .parse()
        .with_context(|| format!("Invalid email address in {key}: {value}"))
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<bool> {
    let Some(value) = lookup(key) else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        _ => bail!("Invalid boolean in {key}: {value}"),
    }
}
