use crate::{monitor, retriever};
use anyhow::{bail, Context, Result};
use base64::prelude::{Engine, BASE64_STANDARD};
use clap::Parser;
use insights_client_processor::{Processor, ProcessorMetrics};
use insights_client_retriever::{ContentStore, Credentials, Retriever, RetrieverMetrics, SharedToken};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::{sync::mpsc, time};
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "insights-client",
    about = "Synchronizes Insights findings and governance violations into per-cluster PolicyReports"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "insights_client=info,warn",
        env = "INSIGHTS_CLIENT_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Base URL of the Insights service.
    #[clap(
        long,
        env = "CCX_SERVER",
        default_value = "http://localhost:8080/api/v1/clusters"
    )]
    ccx_server: String,

    /// Static bearer token for the Insights service; when set, the
    /// pull-secret refresh is disabled.
    #[clap(long, env = "CCX_TOKEN", default_value = "")]
    ccx_token: String,

    /// Timeout for Insights requests, in milliseconds.
    #[clap(long, env = "HTTP_TIMEOUT", default_value = "180000")]
    http_timeout: u64,

    /// Minutes between report poll cycles; also paces the CRD discovery
    /// probe.
    #[clap(long, env = "POLL_INTERVAL", default_value = "30")]
    poll_interval: u64,

    /// Seconds between consecutive per-cluster report requests.
    #[clap(long, env = "REQUEST_INTERVAL", default_value = "1")]
    request_interval: u64,

    /// Namespace that receives the rule-content snapshot ConfigMap.
    #[clap(long, env = "POD_NAMESPACE", default_value = "kube-system")]
    pod_namespace: String,

    /// Base64-encoded PEM bundle trusted for the Insights endpoint.
    #[clap(long, env = "CACert")]
    ca_cert: Option<String>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            ccx_server,
            ccx_token,
            http_timeout,
            poll_interval,
            request_interval,
            pod_namespace,
            ca_cert,
        } = self;

        let mut prom = <Registry>::default();
        let retriever_metrics =
            RetrieverMetrics::register(prom.sub_registry_with_prefix("insights_retriever"));
        let processor_metrics =
            ProcessorMetrics::register(prom.sub_registry_with_prefix("policyreports"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let ca_cert = ca_cert
            .map(|encoded| BASE64_STANDARD.decode(encoded.trim()))
            .transpose()
            .context("CACert is not valid base64")?;
        let http = retriever::http_client(
            time::Duration::from_millis(http_timeout),
            ca_cert.as_deref(),
        )?;

        let poll_interval = time::Duration::from_secs(poll_interval * 60);
        let request_interval = time::Duration::from_secs(request_interval);

        // Keep the inventory current from the ManagedCluster watch.
        let inventory = monitor::Inventory::shared();
        tokio::spawn(
            monitor::ClusterWatch::new(runtime.client(), inventory.clone(), poll_interval)
                .run()
                .instrument(info_span!("clusters")),
        );

        // The hub must know its own cluster id before any Insights call can
        // be attributed.
        let hub_id = loop {
            match monitor::add_local_cluster(&runtime.client(), &inventory).await {
                Ok(hub_id) => break hub_id,
                Err(error) => {
                    info!(%error, "Waiting for the local-cluster id");
                    time::sleep(time::Duration::from_secs(2)).await;
                }
            }
        };
        info!(%hub_id, "Resolved local-cluster id");

        let token = SharedToken::default();
        let credentials = if ccx_token.is_empty() {
            Credentials::PullSecret(runtime.client())
        } else {
            Credentials::Static(ccx_token)
        };
        let connected = credentials.bootstrap(&token).await;
        if !connected {
            warn!(
                "No Insights credentials available; running disconnected, only governance findings will be reported"
            );
        }

        let content = Arc::new(ContentStore::new(
            http.clone(),
            format!("{ccx_server}/content"),
            hub_id.clone(),
            token.clone(),
            runtime.client(),
            pod_namespace,
        ));
        if connected {
            let mut retry = 0;
            loop {
                match content.refresh().await {
                    Ok(rules) => {
                        info!(rules, "Rule content cache initialized");
                        break;
                    }
                    Err(error) => {
                        retry += 1;
                        let delay = retriever::backoff_secs(retry);
                        warn!(%error, retry, delay, "Rule content cache not ready");
                        time::sleep(time::Duration::from_secs(delay)).await;
                    }
                }
            }
        }

        let retriever = Arc::new(Retriever {
            http,
            report_url: format!("{ccx_server}/clusters/reports"),
            hub_id,
            token,
            credentials,
            disconnected: !connected,
            poll_interval,
            request_interval,
            metrics: retriever_metrics,
        });

        let (clusters_tx, clusters_rx) = mpsc::channel(1);
        let (reports_tx, reports_rx) = mpsc::channel(1);

        let ticker = retriever.clone();
        let ticker_inventory = inventory.clone();
        tokio::spawn(
            async move { ticker.fetch_clusters(ticker_inventory, clusters_tx).await }
                .instrument(info_span!("poll_cycle")),
        );
        tokio::spawn(
            async move {
                retriever
                    .retrieve_reports(inventory, clusters_rx, reports_tx)
                    .await
            }
            .instrument(info_span!("reports")),
        );

        let processor = Processor::new(runtime.client(), content, processor_metrics);
        tokio::spawn(processor.run(reports_rx).instrument(info_span!("policyreports")));

        // Block on the shutdown signal; the pipeline tasks stop with the
        // process.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
