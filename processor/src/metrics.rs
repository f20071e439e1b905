use prometheus_client::{metrics::counter::Counter, registry::Registry};

#[derive(Clone, Debug, Default)]
pub struct ProcessorMetrics {
    pub(crate) creates: Counter,
    pub(crate) applies: Counter,
    pub(crate) deletes: Counter,
    pub(crate) failures: Counter,
}

impl ProcessorMetrics {
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "creates",
            "PolicyReports created",
            metrics.creates.clone(),
        );
        registry.register(
            "applies",
            "PolicyReports updated by server-side apply",
            metrics.applies.clone(),
        );
        registry.register(
            "deletes",
            "PolicyReports deleted after their findings cleared",
            metrics.deletes.clone(),
        );
        registry.register(
            "failures",
            "Reconciliations abandoned after a Kubernetes API error",
            metrics.failures.clone(),
        );
        metrics
    }
}
