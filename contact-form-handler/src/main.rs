use contact_form_handler::{
    AwsSecretsManagerSecretRepository, ContactFormHandler, HandlerConfig, SecretRepository,
    SmtpMailTransport, SubmissionRequest,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = HandlerConfig::from_env()?;
    info!(
        "Forwarding contact form submissions to {} (recaptcha skipped: {}, sending disabled: {})",
        config.recipient, config.skip_recaptcha, config.disable_send
    );
    let secrets_repository = AwsSecretsManagerSecretRepository::open(&config.region).await;
    let transport = SmtpMailTransport::new(&config, secrets_repository);
    let handler = ContactFormHandler::new(&config, transport);
    run(service_fn(|event: LambdaEvent<SubmissionRequest>| {
        handler.handle_event(event)
    }))
    .await
}
