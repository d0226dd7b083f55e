use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::net::TcpListener;

const VERIFY_PATH: &str = "/recaptcha/api/siteverify";

/// Stand-in for the reCAPTCHA siteverify endpoint, listening on an ephemeral local port.
#[derive(Clone)]
pub struct FakeRecaptcha {
    required_secret: Cow<'static, str>,
    required_response: Option<String>,
    return_invalid_response: bool,
    request_count: Arc<AtomicUsize>,
}

#[derive(Deserialize)]
struct VerifyRequestPayload {
    secret: String,
    response: String,
}

#[derive(Serialize)]
struct VerifyResponsePayload {
    success: bool,
    #[serde(rename = "error-codes", skip_serializing_if = "Vec::is_empty")]
    error_codes: Vec<&'static str>,
}

impl FakeRecaptcha {
    pub fn new(required_secret: impl Into<Cow<'static, str>>) -> Self {
        Self {
            required_secret: required_secret.into(),
            required_response: None,
            return_invalid_response: false,
            request_count: Default::default(),
        }
    }

    pub fn require_response(self, required_response: impl AsRef<str>) -> Self {
        Self {
            required_response: Some(required_response.as_ref().into()),
            ..self
        }
    }

    pub fn return_invalid_response(self) -> Self {
        Self {
            return_invalid_response: true,
            ..self
        }
    }

    /// Starts serving in the background and returns the verification URL.
    pub async fn serve(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new()
            .route(VERIFY_PATH, post(verify))
            .with_state(self.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{address}{VERIFY_PATH}")
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

async fn verify(
    State(state): State<FakeRecaptcha>,
    Form(payload): Form<VerifyRequestPayload>,
) -> Response {
    state.request_count.fetch_add(1, Ordering::SeqCst);
    debug!("Got reCAPTCHA verification request for {}", payload.response);
    if state.return_invalid_response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            "Invalid response",
        )
            .into_response()
    } else if payload.secret != state.required_secret {
        Json(VerifyResponsePayload {
            success: false,
            error_codes: vec!["invalid-input-secret"],
        })
        .into_response()
    } else if state
        .required_response
        .as_ref()
        .is_some_and(|required| *required != payload.response)
    {
        Json(VerifyResponsePayload {
            success: false,
            error_codes: vec!["invalid-input-response"],
        })
        .into_response()
    } else {
        Json(VerifyResponsePayload {
            success: true,
            error_codes: vec![],
        })
        .into_response()
    }
}
