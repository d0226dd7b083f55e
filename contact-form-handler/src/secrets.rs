use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[async_trait]
pub trait SecretRepository: Send + Sync {
    async fn open(region: &str) -> Self;

    async fn get_secret<T: DeserializeOwned>(&self, name: &str) -> Result<T, SecretError>;
}

pub struct AwsSecretsManagerSecretRepository(aws_sdk_secretsmanager::Client);

#[async_trait]
impl SecretRepository for AwsSecretsManagerSecretRepository {
    async fn open(region: &str) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_owned()));
        if let Ok(url) = std::env::var("AWS_ENDPOINT_URL") {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        let secrets_client = aws_sdk_secretsmanager::Client::new(&config);
        Self(secrets_client)
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &str) -> Result<T, SecretError> {
        let secret = self
            .0
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(aws_sdk_secretsmanager::Error::from)?;
        let Some(secret_value) = secret.secret_string() else {
            return Err(SecretError::MissingSecret(name.to_owned()));
        };
        Ok(serde_json::from_str(secret_value)?)
    }
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secrets Manager error: {0}")]
    Aws(#[from] aws_sdk_secretsmanager::Error),
    #[error("Missing secret {0}")]
    MissingSecret(String),
    #[error("Malformed secret: {0}")]
    Malformed(#[from] serde_json::Error),
}
