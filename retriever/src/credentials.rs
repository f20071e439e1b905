use ahash::AHashMap as HashMap;
use insights_client_k8s_api::{self as k8s, Secret};
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::time;
use tracing::{info, warn};

const PULL_SECRET_NAMESPACE: &str = "openshift-config";
const PULL_SECRET_NAME: &str = "pull-secret";
const PULL_SECRET_KEY: &str = ".dockerconfigjson";
const CLOUD_REGISTRY: &str = "cloud.openshift.com";

const BOOTSTRAP_ATTEMPTS: u32 = 12;
const BOOTSTRAP_DELAY: time::Duration = time::Duration::from_secs(5);

/// The current Authorization header value, shared between the refresh path
/// and the request paths.
pub type SharedToken = Arc<RwLock<String>>;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("pull-secret not found")]
    SecretNotFound,

    #[error("access to the pull-secret is forbidden")]
    SecretForbidden,

    #[error("failed to read the pull-secret: {0}")]
    Api(#[source] k8s::Error),

    #[error("pull-secret has no .dockerconfigjson entry")]
    MissingDockerConfig,

    #[error("malformed dockerconfigjson: {0}")]
    MalformedDockerConfig(#[from] serde_json::Error),

    #[error("no cloud.openshift.com auth entry in the pull-secret")]
    MissingRegistryEntry,

    #[error("cluster authorization token is empty")]
    EmptyToken,

    #[error("cluster authorization token contains line breaks")]
    InvalidToken,
}

#[derive(Deserialize)]
struct DockerConfig {
    auths: HashMap<String, DockerAuth>,
}

#[derive(Deserialize)]
struct DockerAuth {
    #[serde(default)]
    auth: String,
}

/// Source of the bearer token presented to the Insights service.
pub enum Credentials {
    /// Fixed token from configuration; never refreshed.
    Static(String),
    /// Token extracted from the cluster pull-secret on every poll cycle.
    PullSecret(k8s::Client),
}

impl Credentials {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::PullSecret(_))
    }

    /// Produces a fresh `Bearer ...` header value.
    pub async fn fetch(&self) -> Result<String, CredentialError> {
        match self {
            Self::Static(token) => format_token(token),
            Self::PullSecret(client) => {
                let api =
                    k8s::Api::<Secret>::namespaced(client.clone(), PULL_SECRET_NAMESPACE);
                let secret = api.get(PULL_SECRET_NAME).await.map_err(|error| match error {
                    k8s::Error::Api(response) if response.code == 404 => {
                        CredentialError::SecretNotFound
                    }
                    k8s::Error::Api(response) if response.code == 403 => {
                        CredentialError::SecretForbidden
                    }
                    error => CredentialError::Api(error),
                })?;
                let data = secret
                    .data
                    .as_ref()
                    .and_then(|data| data.get(PULL_SECRET_KEY))
                    .ok_or(CredentialError::MissingDockerConfig)?;
                parse_pull_secret(&data.0)
            }
        }
    }

    /// Refreshes the shared token; the previous value is kept on failure.
    pub async fn refresh(&self, token: &SharedToken) -> bool {
        match self.fetch().await {
            Ok(fresh) => {
                *token.write() = fresh;
                true
            }
            Err(error) => {
                warn!(%error, "Failed to refresh Insights credentials");
                false
            }
        }
    }

    /// Initial credential acquisition. Returns false when no credentials
    /// could be obtained, in which case the retriever runs disconnected for
    /// the rest of the process lifetime.
    pub async fn bootstrap(&self, token: &SharedToken) -> bool {
        for attempt in 1..=BOOTSTRAP_ATTEMPTS {
            if self.refresh(token).await {
                return true;
            }
            info!(attempt, "Waiting for Insights credentials");
            time::sleep(BOOTSTRAP_DELAY).await;
        }
        false
    }
}

fn parse_pull_secret(data: &[u8]) -> Result<String, CredentialError> {
    let config: DockerConfig = serde_json::from_slice(data)?;
    let auth = config
        .auths
        .get(CLOUD_REGISTRY)
        .ok_or(CredentialError::MissingRegistryEntry)?;
    format_token(&auth.auth)
}

fn format_token(raw: &str) -> Result<String, CredentialError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(CredentialError::EmptyToken);
    }
    if token.contains('\n') || token.contains('\r') {
        return Err(CredentialError::InvalidToken);
    }
    Ok(format!("Bearer {token}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_cloud_token() {
        let token = parse_pull_secret(
            br#"{"auths":{"quay.io":{"auth":"other"},"cloud.openshift.com":{"auth":"  abc123  "}}}"#,
        )
        .unwrap();
        assert_eq!(token, "Bearer abc123");
    }

    #[test]
    fn rejects_tokens_with_line_breaks() {
        let err = parse_pull_secret(
            br#"{"auths":{"cloud.openshift.com":{"auth":"abc\ndef"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CredentialError::InvalidToken));

        let err = format_token("abc\rdef").unwrap_err();
        assert!(matches!(err, CredentialError::InvalidToken));
    }

    #[test]
    fn rejects_empty_and_whitespace_tokens() {
        let err = parse_pull_secret(
            br#"{"auths":{"cloud.openshift.com":{"auth":"   "}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CredentialError::EmptyToken));
    }

    #[test]
    fn missing_registry_entry_is_a_configuration_error() {
        let err = parse_pull_secret(br#"{"auths":{"quay.io":{"auth":"abc"}}}"#).unwrap_err();
        assert!(matches!(err, CredentialError::MissingRegistryEntry));
    }

    #[test]
    fn malformed_dockerconfig_is_a_configuration_error() {
        let err = parse_pull_secret(b"not-json").unwrap_err();
        assert!(matches!(err, CredentialError::MalformedDockerConfig(_)));
    }

    #[tokio::test]
    async fn static_credentials_are_normalized() {
        let credentials = Credentials::Static(" tok-42 ".to_string());
        assert!(!credentials.is_dynamic());
        assert_eq!(credentials.fetch().await.unwrap(), "Bearer tok-42");
    }
}
