use crate::{
    config::HandlerConfig,
    error::ContactFormError,
    mailer::{MailDispatcher, MailTransport},
    payload::{extract_submission, SubmissionRequest},
    recaptcha::RecaptchaVerifier,
    response::ResponseEnvelope,
    validation::{SchemaValidator, ValidatedSubmission},
};
use lambda_runtime::{Error, LambdaEvent};
use reqwest::StatusCode;
use tracing::{info, info_span, Instrument};

pub const SUCCESS_MESSAGE: &str = "Mail sent successfully";

/// Runs a submission through extraction, validation, reCAPTCHA verification and dispatch.
///
/// One instance serves every invocation of the function. Nothing in it is mutated per request.
pub struct ContactFormHandler<TransportT: MailTransport> {
    validator: SchemaValidator,
    recaptcha_verifier: RecaptchaVerifier,
    skip_recaptcha: bool,
    dispatcher: MailDispatcher<TransportT>,
}

impl<TransportT: MailTransport> ContactFormHandler<TransportT> {
    pub fn new(config: &HandlerConfig, transport: TransportT) -> Self {
        Self {
            validator: SchemaValidator::new(),
            recaptcha_verifier: RecaptchaVerifier::new(
                config.recaptcha_secret.clone(),
                config.recaptcha_verify_url.clone(),
            ),
            skip_recaptcha: config.skip_recaptcha,
            dispatcher: MailDispatcher::new(config, transport),
        }
    }

    pub async fn handle_event(
        &self,
        event: LambdaEvent<SubmissionRequest>,
    ) -> Result<ResponseEnvelope, Error> {
        let span = info_span!("submission", request_id = %event.context.request_id);
        Ok(self.handle(&event.payload).instrument(span).await)
    }

    pub async fn handle(&self, request: &SubmissionRequest) -> ResponseEnvelope {
        match self.process_submission(request).await {
            Ok(()) => ResponseEnvelope::success(StatusCode::OK, SUCCESS_MESSAGE),
            Err(error) => {
                error.log();
                error.into_response()
            }
        }
    }

    async fn process_submission(&self, request: &SubmissionRequest) -> Result<(), ContactFormError> {
        let submission = extract_submission(request).await?;
        let validated_submission = self.validator.validate(&submission)?;
        self.verify_recaptcha(&validated_submission).await?;
        self.dispatcher.dispatch(&validated_submission).await?;
        info!(
            "Handled submission \"{}\" with {} attachment(s)",
            validated_submission.subject,
            validated_submission.files.len()
        );
        Ok(())
    }

    async fn verify_recaptcha(
        &self,
        submission: &ValidatedSubmission<'_>,
    ) -> Result<(), ContactFormError> {
        if self.skip_recaptcha {
            info!("reCAPTCHA verification skipped by configuration");
            return Ok(());
        }
        if self
            .recaptcha_verifier
            .verify_token(submission.recaptcha)
            .await?
        {
            Ok(())
        } else {
            Err(ContactFormError::RecaptchaRejected)
        }
    }
}
