use crate::{user_agent, Credentials, RetrieverMetrics, SharedToken};
use insights_client_core::{ManagedClusterInfo, ProcessorData, ReportBody, ResponseBody};
use insights_client_k8s_monitor::SharedInventory;
use reqwest::{header, StatusCode};
use tokio::{sync::mpsc, time};
use tracing::{debug, info, warn};

/// Drives the per-cluster report fan-out against the Insights service.
///
/// Two tasks share one retriever: a ticker that enqueues the inventory once
/// per poll cycle, and a dispatcher that issues at most one request per
/// cluster per cycle. Retries happen on the next tick, never per request.
pub struct Retriever {
    pub http: reqwest::Client,
    /// Base URL for report requests, `<server>/clusters/reports`.
    pub report_url: String,
    pub hub_id: String,
    pub token: SharedToken,
    pub credentials: Credentials,
    /// Set when no credentials could be obtained at startup; all SaaS calls
    /// are skipped and only governance findings reach the reports.
    pub disconnected: bool,
    pub poll_interval: time::Duration,
    pub request_interval: time::Duration,
    pub metrics: RetrieverMetrics,
}

impl Retriever {
    /// Enqueues every inventory cluster once per poll cycle, pacing sends so
    /// the Insights service does not rate-limit the hub.
    pub async fn fetch_clusters(
        &self,
        inventory: SharedInventory,
        requests: mpsc::Sender<ManagedClusterInfo>,
    ) {
        let mut ticks = time::interval(self.poll_interval);
        loop {
            ticks.tick().await;
            if self.credentials.is_dynamic() {
                self.credentials.refresh(&self.token).await;
            }
            let clusters = inventory.read().managed_clusters();
            info!(clusters = clusters.len(), "Starting report poll cycle");
            for cluster in clusters {
                if requests.send(cluster).await.is_err() {
                    return;
                }
                time::sleep(self.request_interval).await;
            }
        }
    }

    /// Consumes the request channel sequentially, emitting one
    /// [`ProcessorData`] per cluster. Clusters that are not polled still
    /// produce an empty report so the governance path runs for them.
    pub async fn retrieve_reports(
        &self,
        inventory: SharedInventory,
        mut requests: mpsc::Receiver<ManagedClusterInfo>,
        reports: mpsc::Sender<ProcessorData>,
    ) {
        while let Some(cluster) = requests.recv().await {
            if cluster.namespace.is_empty() || cluster.cluster_id.is_empty() {
                debug!("Skipping cluster with an incomplete identity");
                continue;
            }
            let polled = inventory.read().is_poll_enabled(&cluster.cluster_id);
            let report = if !polled || self.disconnected {
                self.metrics.empty_reports.inc();
                ReportBody::default()
            } else {
                self.cluster_report(&cluster).await
            };
            if reports.send(ProcessorData { cluster, report }).await.is_err() {
                return;
            }
        }
    }

    /// One GET against the reports endpoint. Every failure mode degrades to
    /// an empty report; the status-code contract is part of the wire
    /// protocol (400: unregistered cluster, 401: wrong organization).
    async fn cluster_report(&self, cluster: &ManagedClusterInfo) -> ReportBody {
        let url = format!("{}/cluster/{}/reports", self.report_url, cluster.cluster_id);
        debug!(cluster = %cluster.namespace, %url, "Retrieving cluster report");

        // The token guard must not be held across the await.
        let token = self.token.read().clone();
        let response = match self
            .http
            .get(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, user_agent(&self.hub_id))
            .header(header::AUTHORIZATION, token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                self.metrics.fetch_errors.inc();
                warn!(cluster = %cluster.namespace, %error, "Report request failed");
                return ReportBody::default();
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<ResponseBody>().await {
                Ok(body) => {
                    self.metrics.reports_fetched.inc();
                    body.report
                }
                Err(error) => {
                    self.metrics.fetch_errors.inc();
                    warn!(cluster = %cluster.namespace, %error, "Failed to decode the report response");
                    ReportBody::default()
                }
            },
            StatusCode::BAD_REQUEST => {
                info!(
                    cluster = %cluster.namespace,
                    "Cluster is not registered with the Insights service"
                );
                ReportBody::default()
            }
            StatusCode::UNAUTHORIZED => {
                info!(
                    cluster = %cluster.namespace,
                    "Insights credentials are not valid for this cluster's organization"
                );
                ReportBody::default()
            }
            status => {
                self.metrics.fetch_errors.inc();
                warn!(cluster = %cluster.namespace, %status, "Unexpected report response");
                ReportBody::default()
            }
        }
    }
}
