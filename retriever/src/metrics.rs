use prometheus_client::{metrics::counter::Counter, registry::Registry};

#[derive(Clone, Debug, Default)]
pub struct RetrieverMetrics {
    pub(crate) reports_fetched: Counter,
    pub(crate) fetch_errors: Counter,
    pub(crate) empty_reports: Counter,
}

impl RetrieverMetrics {
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "reports_fetched",
            "Cluster reports successfully retrieved from the Insights service",
            metrics.reports_fetched.clone(),
        );
        registry.register(
            "fetch_errors",
            "Cluster report requests that failed or returned an unexpected status",
            metrics.fetch_errors.clone(),
        );
        registry.register(
            "empty_reports",
            "Clusters forwarded with an empty report (ineligible, disconnected or failed)",
            metrics.empty_reports.clone(),
        );
        metrics
    }
}
