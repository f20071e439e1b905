use crate::policies::governance_results;
use crate::results::{build_policy_report, convergence_action, insights_result, report_name, Action};
use crate::ProcessorMetrics;
use insights_client_core::{ManagedClusterInfo, ProcessorData, ReportData};
use insights_client_k8s_api::policy::Policy;
use insights_client_k8s_api::report::{PolicyReport, PolicyReportResult};
use insights_client_k8s_api::{
    self as k8s, Api, DeleteParams, ListParams, Patch, PatchParams, PostParams,
};
use insights_client_retriever::ContentStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Field manager for server-side apply of PolicyReports.
pub const FIELD_MANAGER: &str = "insights-client";

/// Reconciles one cluster at a time: the PolicyReport named
/// `<namespace>-policyreport` converges onto the union of the latest Insights
/// findings and the current governance violations.
///
/// A single worker consumes the channel, so writes to any one namespace are
/// strictly serialized. Every failure is logged and abandoned until the next
/// poll cycle; nothing here halts the pipeline.
pub struct Processor {
    client: k8s::Client,
    content: Arc<ContentStore>,
    metrics: ProcessorMetrics,
}

impl Processor {
    pub fn new(client: k8s::Client, content: Arc<ContentStore>, metrics: ProcessorMetrics) -> Self {
        Self {
            client,
            content,
            metrics,
        }
    }

    pub async fn run(self, mut reports: mpsc::Receiver<ProcessorData>) {
        while let Some(data) = reports.recv().await {
            self.reconcile(data).await;
        }
    }

    async fn reconcile(&self, data: ProcessorData) {
        let ProcessorData { cluster, report } = data;
        if cluster.cluster_id.is_empty() || cluster.namespace.is_empty() {
            debug!("Dropping report for a cluster with an incomplete identity");
            return;
        }

        let mut results = self.insights_results(&report.data).await;
        match self.cluster_policies(&cluster.namespace).await {
            Ok(policies) => results.extend(governance_results(&policies)),
            Err(error) => {
                // Without the governance view the combined findings would be
                // incomplete and could tear down a live report; retry on the
                // next cycle instead.
                warn!(cluster = %cluster.namespace, %error, "Failed to list governance policies");
                self.metrics.failures.inc();
                return;
            }
        }

        self.converge(&cluster, results).await;
    }

    /// Results for the findings whose key resolves in the content cache. A
    /// miss triggers one cache refresh before the finding is dropped.
    async fn insights_results(&self, data: &[ReportData]) -> Vec<PolicyReportResult> {
        let contents = self.content.contents();
        let mut results = Vec::new();
        for report in data {
            if report.key.is_empty() {
                continue;
            }
            if !contents.contains(&report.key) {
                info!(key = %report.key, "Rule content missing; refreshing the content cache");
                if let Err(error) = self.content.refresh().await {
                    warn!(%error, "Failed to refresh rule content");
                }
            }
            if let Some(result) = insights_result(contents, report) {
                results.push(result);
            }
        }
        results
    }

    async fn cluster_policies(&self, namespace: &str) -> Result<Vec<Policy>, k8s::Error> {
        let api = Api::<Policy>::namespaced(self.client.clone(), namespace);
        match api.list(&ListParams::default()).await {
            Ok(policies) => Ok(policies.items),
            // The governance CRD may simply not be installed.
            Err(k8s::Error::Api(response)) if response.code == 404 => Ok(Vec::new()),
            Err(error) => Err(error),
        }
    }

    async fn converge(&self, cluster: &ManagedClusterInfo, results: Vec<PolicyReportResult>) {
        let api = Api::<PolicyReport>::namespaced(self.client.clone(), &cluster.namespace);
        let name = report_name(&cluster.namespace);

        let current = match api.get_opt(&name).await {
            Ok(current) => current,
            Err(error) => {
                warn!(cluster = %cluster.namespace, %error, "Failed to read the PolicyReport");
                self.metrics.failures.inc();
                return;
            }
        };

        match convergence_action(current.as_ref(), &results) {
            Action::NoOp => {}
            Action::Create => {
                let failures = results.len();
                let desired = build_policy_report(cluster, results);
                match api.create(&PostParams::default(), &desired).await {
                    Ok(_) => {
                        self.metrics.creates.inc();
                        info!(cluster = %cluster.namespace, failures, "Created PolicyReport");
                    }
                    Err(error) => {
                        self.metrics.failures.inc();
                        warn!(cluster = %cluster.namespace, %error, "Failed to create the PolicyReport");
                    }
                }
            }
            Action::Apply => {
                let failures = results.len();
                let mut desired = build_policy_report(cluster, results);
                desired.metadata.managed_fields = None;
                let params = PatchParams::apply(FIELD_MANAGER).force();
                match api.patch(&name, &params, &Patch::Apply(&desired)).await {
                    Ok(_) => {
                        self.metrics.applies.inc();
                        info!(cluster = %cluster.namespace, failures, "Applied PolicyReport");
                    }
                    Err(error) => {
                        self.metrics.failures.inc();
                        warn!(cluster = %cluster.namespace, %error, "Failed to apply the PolicyReport");
                    }
                }
            }
            Action::Delete => {
                match api.delete(&name, &DeleteParams::default()).await {
                    Ok(_) => {
                        self.metrics.deletes.inc();
                        info!(cluster = %cluster.namespace, "Deleted PolicyReport: findings cleared");
                    }
                    Err(error) => {
                        self.metrics.failures.inc();
                        warn!(cluster = %cluster.namespace, %error, "Failed to delete the PolicyReport");
                    }
                }
            }
        }
    }
}
