use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// What the proxy integration turns into the HTTP response.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ResponseEnvelope {
    pub fn success(status: StatusCode, message: &str) -> Self {
        Self::new(status, json!({ "message": message }))
    }

    pub fn error(status: StatusCode, message: &str, error: &str) -> Self {
        Self::new(status, json!({ "message": message, "error": error }))
    }

    fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status_code: status.as_u16(),
            headers: BTreeMap::from([
                ("Access-Control-Allow-Origin".into(), "*".into()),
                ("Content-Type".into(), "application/json".into()),
            ]),
            body: body.to_string(),
        }
    }
}
