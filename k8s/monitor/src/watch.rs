use crate::SharedInventory;
use anyhow::{ensure, Result};
use futures::StreamExt;
use insights_client_k8s_api::{
    self as k8s,
    cluster::ManagedCluster,
    cluster_version::ClusterVersion,
};
use kube::runtime::watcher;
use tokio::{task::JoinHandle, time};
use tracing::{info, warn};

const MANAGED_CLUSTER_GROUP_VERSION: &str = "cluster.open-cluster-management.io/v1";
const MANAGED_CLUSTER_KIND: &str = "ManagedCluster";

/// Keeps the shared inventory current from a ManagedCluster watch.
///
/// The ManagedCluster CRD may be installed or removed while the process runs,
/// so the watch is gated on API discovery: each tick probes the group-version
/// and the watch task is started or aborted to match. Discovery failures other
/// than the kind being absent leave the current state untouched.
pub struct ClusterWatch {
    client: k8s::Client,
    inventory: SharedInventory,
    poll_interval: time::Duration,
}

impl ClusterWatch {
    pub fn new(
        client: k8s::Client,
        inventory: SharedInventory,
        poll_interval: time::Duration,
    ) -> Self {
        Self {
            client,
            inventory,
            poll_interval,
        }
    }

    pub async fn run(self) {
        let mut ticks = time::interval(self.poll_interval);
        let mut watch: Option<JoinHandle<()>> = None;
        loop {
            ticks.tick().await;
            match managed_cluster_kind_exists(&self.client).await {
                Ok(true) => {
                    if watch.as_ref().map_or(true, |task| task.is_finished()) {
                        info!("Starting cluster watch for {MANAGED_CLUSTER_GROUP_VERSION}");
                        watch = Some(tokio::spawn(watch_clusters(
                            self.client.clone(),
                            self.inventory.clone(),
                        )));
                    }
                }
                Ok(false) => {
                    if let Some(task) = watch.take() {
                        info!(
                            "Stopping cluster watch: {MANAGED_CLUSTER_GROUP_VERSION} is no longer served"
                        );
                        task.abort();
                    }
                }
                Err(error) => {
                    warn!(%error, "Failed to probe discovery for {MANAGED_CLUSTER_GROUP_VERSION}");
                }
            }
        }
    }
}

async fn managed_cluster_kind_exists(client: &k8s::Client) -> Result<bool> {
    match client
        .list_api_group_resources(MANAGED_CLUSTER_GROUP_VERSION)
        .await
    {
        Ok(resources) => Ok(resources
            .resources
            .iter()
            .any(|r| r.kind == MANAGED_CLUSTER_KIND)),
        Err(k8s::Error::Api(response)) if response.code == 404 => Ok(false),
        Err(error) => Err(error.into()),
    }
}

/// Feeds ManagedCluster events into the inventory's index impl. Relists
/// (after a restart or an internal watcher recovery) pass through the index
/// `reset()`, which also removes clusters deleted while the watch was down.
async fn watch_clusters(client: k8s::Client, inventory: SharedInventory) {
    let api = k8s::Api::<ManagedCluster>::all(client);
    let events = watcher(api, watcher::Config::default()).filter_map(|event| async move {
        match event {
            Ok(event) => Some(event),
            Err(error) => {
                // The watcher retries internally; individual errors drop only
                // the affected events.
                warn!(%error, "Cluster watch stream error");
                None
            }
        }
    });
    kubert::index::cluster(inventory, events).await;
}

/// Reads the hub's ClusterVersion and records its id as the `local-cluster`
/// inventory entry. Returns the hub id.
pub async fn add_local_cluster(
    client: &k8s::Client,
    inventory: &SharedInventory,
) -> Result<String> {
    let api = k8s::Api::<ClusterVersion>::all(client.clone());
    let version = api.get("version").await?;
    let hub_id = version.spec.cluster_id.trim().to_string();
    ensure!(!hub_id.is_empty(), "ClusterVersion has an empty spec.clusterID");
    inventory.write().add_local_cluster(hub_id.clone());
    Ok(hub_id)
}
