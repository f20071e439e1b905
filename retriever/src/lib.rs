#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod content;
mod credentials;
mod metrics;
mod report;

pub use self::content::{backoff_secs, ContentMap, ContentStore, CONTENT_CONFIGMAP};
pub use self::credentials::{CredentialError, Credentials, SharedToken};
pub use self::metrics::RetrieverMetrics;
pub use self::report::Retriever;

use std::time::Duration;

/// User-Agent advertised on every Insights request; the hub id lets the
/// service attribute traffic to this hub.
pub(crate) fn user_agent(hub_id: &str) -> String {
    format!("acm-operator/v2.3.0 cluster/{hub_id}")
}

/// Builds the HTTP client used for SaaS calls: bounded timeouts, no
/// connection reuse, proxy settings from the environment, and an optional
/// extra trust root for self-signed endpoints.
pub fn http_client(timeout: Duration, ca_cert: Option<&[u8]>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(0);
    if let Some(pem) = ca_cert {
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(pem)?);
    }
    builder.build().map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::user_agent;

    #[test]
    fn user_agent_carries_the_hub_id() {
        assert_eq!(user_agent("hub-1"), "acm-operator/v2.3.0 cluster/hub-1");
    }
}
