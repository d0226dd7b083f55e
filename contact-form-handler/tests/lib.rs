use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use contact_form_handler::{
    secrets::SecretError, ContactFormHandler, HandlerConfig, SecretRepository, SmtpMailTransport,
    SubmissionRequest,
};
use googletest::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use serial_test::serial;
use std::{sync::OnceLock, time::Duration};
use test_support::{
    fake_recaptcha::FakeRecaptcha,
    fake_smtp::{poisoned_url, start_poisoned_smtp_server, FakeSmtpServer},
    setup_logging,
};
use tokio::time::timeout;

const RECAPTCHA_SECRET: &str = "arbitrary secret";
const CORRECT_TOKEN: &str = "correct token";
const BOUNDARY: &str = "----endtoendboundary";

/// Plain SMTP never asks for credentials, so nothing is stored.
struct EmptySecretRepository;

#[async_trait]
impl SecretRepository for EmptySecretRepository {
    async fn open(_region: &str) -> Self {
        Self
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &str) -> std::result::Result<T, SecretError> {
        Err(SecretError::MissingSecret(name.into()))
    }
}

type HandlerForTesting = ContactFormHandler<SmtpMailTransport<EmptySecretRepository>>;

async fn handler(config: HandlerConfig) -> HandlerForTesting {
    let transport = SmtpMailTransport::new(&config, EmptySecretRepository::open("").await);
    ContactFormHandler::new(&config, transport)
}

fn config() -> HandlerConfig {
    HandlerConfig::new(
        "Web contact form <noreply@example.com>".parse().unwrap(),
        "Site owner <owner@example.com>".parse().unwrap(),
    )
    .with_smtp_url(FakeSmtpServer::url())
}

fn proxy_event(content_type: &str, body: impl Into<String>, is_base64_encoded: bool) -> SubmissionRequest {
    serde_json::from_value(json!({
        "headers": { "content-type": content_type },
        "body": body.into(),
        "isBase64Encoded": is_base64_encoded
    }))
    .unwrap()
}

fn json_event(recaptcha: &str) -> SubmissionRequest {
    let payload = json!({
        "name": "Jane Doe",
        "email": "jane@example.com",
        "subject": "Question about your work",
        "message": "Could we talk?",
        "recaptcha": recaptcha
    });
    proxy_event("application/json", payload.to_string(), false)
}

fn multipart_event() -> SubmissionRequest {
    let mut body = String::new();
    for (name, value) in [
        ("name", "Jane Doe"),
        ("email", "jane@example.com"),
        ("subject", "Files attached"),
        ("message", "Please see the notes."),
        ("recaptcha", CORRECT_TOKEN),
    ] {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
    ));
    proxy_event(
        &format!("multipart/form-data; boundary={BOUNDARY}"),
        STANDARD.encode(body),
        true,
    )
}

fn body(envelope_body: &str) -> Value {
    serde_json::from_str(envelope_body).unwrap()
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn delivers_multipart_submission_with_attachment() {
    setup_logging();
    fake_smtp().start();
    fake_smtp().flush().await;
    let fake_recaptcha = FakeRecaptcha::new(RECAPTCHA_SECRET).require_response(CORRECT_TOKEN);
    let config = config()
        .with_recaptcha_secret(RECAPTCHA_SECRET)
        .with_recaptcha_verify_url(fake_recaptcha.serve().await);
    let subject = handler(config).await;

    let response = subject.handle(&multipart_event()).await;

    expect_that!(response.status_code, eq(200));
    expect_that!(
        body(&response.body),
        eq(json!({ "message": "Mail sent successfully" }))
    );
    expect_that!(
        timeout(Duration::from_secs(1), fake_smtp().last_mail_content()).await,
        ok(ok(all!(
            contains_substring("Subject: Files attached"),
            contains_substring("Reply-To: \"Jane Doe\" <jane@example.com>"),
            contains_substring("To: \"Site owner\" <owner@example.com>"),
            contains_substring("filename=\"notes.txt\""),
            contains_substring("Please see the notes.")
        )))
    );
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn delivers_json_submission() {
    setup_logging();
    fake_smtp().start();
    fake_smtp().flush().await;
    let subject = handler(config().with_skip_recaptcha(true)).await;

    let response = subject.handle(&json_event("unchecked token")).await;

    expect_that!(response.status_code, eq(200));
    expect_that!(
        timeout(Duration::from_secs(1), fake_smtp().last_mail_content()).await,
        ok(ok(all!(
            contains_substring("Subject: Question about your work"),
            contains_substring("Could we talk?")
        )))
    );
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn delivers_nothing_when_recaptcha_rejects_token() {
    setup_logging();
    fake_smtp().start();
    fake_smtp().flush().await;
    let fake_recaptcha = FakeRecaptcha::new(RECAPTCHA_SECRET).require_response(CORRECT_TOKEN);
    let config = config()
        .with_recaptcha_secret(RECAPTCHA_SECRET)
        .with_recaptcha_verify_url(fake_recaptcha.serve().await);
    let subject = handler(config).await;

    let response = subject.handle(&json_event("incorrect token")).await;

    expect_that!(response.status_code, eq(400));
    expect_that!(
        body(&response.body),
        eq(json!({ "message": "reCAPTCHA failed", "error": "Invalid reCAPTCHA" }))
    );
    expect_that!(
        timeout(Duration::from_millis(500), fake_smtp().last_mail_content()).await,
        err(anything())
    );
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn delivers_nothing_when_sending_is_disabled() {
    setup_logging();
    fake_smtp().start();
    fake_smtp().flush().await;
    let subject = handler(config().with_skip_recaptcha(true).with_disable_send(true)).await;

    let response = subject.handle(&json_event("unchecked token")).await;

    expect_that!(response.status_code, eq(200));
    expect_that!(
        timeout(Duration::from_millis(500), fake_smtp().last_mail_content()).await,
        err(anything())
    );
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn returns_generic_error_when_smtp_server_fails() {
    setup_logging();
    start_poisoned_smtp_server();
    let subject = handler(
        config()
            .with_skip_recaptcha(true)
            .with_smtp_url(poisoned_url()),
    )
    .await;

    let response = subject.handle(&json_event("unchecked token")).await;

    expect_that!(response.status_code, eq(500));
    expect_that!(
        body(&response.body),
        eq(json!({
            "message": "Internal error, please try again later",
            "error": "Internal server error"
        }))
    );
}

fn fake_smtp() -> &'static FakeSmtpServer {
    static FAKE_SMTP: OnceLock<FakeSmtpServer> = OnceLock::new();
    FAKE_SMTP.get_or_init(FakeSmtpServer::new)
}
