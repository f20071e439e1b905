use ahash::AHashMap as HashMap;
use insights_client_core::ManagedClusterInfo;
use insights_client_k8s_api::{cluster::ManagedCluster, ResourceExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Namespace of the hub's own entry in the inventory. The hub is registered
/// from its ClusterVersion resource, not from ManagedCluster events.
pub const LOCAL_CLUSTER: &str = "local-cluster";

const VENDOR_CLAIM: &str = "product.open-cluster-management.io";
const VERSION_CLAIM: &str = "version.openshift.io";
const OPENSHIFT_ID_CLAIM: &str = "id.openshift.io";
const KUBERNETES_ID_CLAIM: &str = "id.k8s.io";

const OPENSHIFT_VENDOR: &str = "OpenShift";
const MIN_INSIGHTS_MAJOR: u32 = 4;

pub type SharedInventory = Arc<RwLock<Inventory>>;

/// The authoritative set of managed clusters, updated from the ManagedCluster
/// watch. Mutations take the writer lock; readers receive snapshot copies.
///
/// Each cluster id also carries a poll flag recording whether the cluster is
/// eligible for Insights polling. Ineligible clusters stay in the inventory so
/// that governance findings are still reconciled for them.
#[derive(Debug, Default)]
pub struct Inventory {
    clusters: Vec<ManagedClusterInfo>,
    poll_flags: HashMap<String, bool>,
}

#[derive(Debug, Default)]
struct ClaimInfo {
    vendor: String,
    major_version: u32,
    cluster_id: String,
}

impl ClaimInfo {
    fn poll_eligible(&self) -> bool {
        self.vendor == OPENSHIFT_VENDOR && self.major_version >= MIN_INSIGHTS_MAJOR
    }
}

fn cluster_claims(resource: &ManagedCluster) -> ClaimInfo {
    let mut info = ClaimInfo::default();
    let mut fallback_id = None;
    let claims = resource
        .status
        .as_ref()
        .map(|status| status.cluster_claims.as_slice())
        .unwrap_or_default();
    for claim in claims {
        match claim.name.as_str() {
            VENDOR_CLAIM => info.vendor = claim.value.clone(),
            VERSION_CLAIM => {
                // Only the leading digit of the version claim is significant.
                info.major_version = claim
                    .value
                    .chars()
                    .next()
                    .and_then(|c| c.to_digit(10))
                    .unwrap_or(0);
            }
            OPENSHIFT_ID_CLAIM => info.cluster_id = claim.value.clone(),
            KUBERNETES_ID_CLAIM => fallback_id = Some(claim.value.clone()),
            _ => {}
        }
    }
    if info.cluster_id.is_empty() {
        if let Some(id) = fallback_id {
            info.cluster_id = id;
        }
    }
    info
}

impl Inventory {
    pub fn shared() -> SharedInventory {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Records the hub itself under the distinguished `local-cluster` entry.
    /// The hub is always eligible for Insights polling.
    pub fn add_local_cluster(&mut self, cluster_id: String) {
        if let Some(entry) = self
            .clusters
            .iter_mut()
            .find(|c| c.namespace == LOCAL_CLUSTER)
        {
            let previous = std::mem::replace(&mut entry.cluster_id, cluster_id.clone());
            self.poll_flags.remove(&previous);
        } else {
            self.clusters.push(ManagedClusterInfo {
                cluster_id: cluster_id.clone(),
                namespace: LOCAL_CLUSTER.to_string(),
            });
        }
        self.poll_flags.insert(cluster_id, true);
    }

    /// The hub's cluster id, once `add_local_cluster` has run.
    pub fn local_cluster(&self) -> Option<String> {
        self.clusters
            .iter()
            .find(|c| c.namespace == LOCAL_CLUSTER)
            .map(|c| c.cluster_id.clone())
    }

    /// Snapshot of the inventory in insertion order.
    pub fn managed_clusters(&self) -> Vec<ManagedClusterInfo> {
        self.clusters.clone()
    }

    pub fn is_poll_enabled(&self, cluster_id: &str) -> bool {
        self.poll_flags.get(cluster_id).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

impl kubert::index::IndexClusterResource<ManagedCluster> for Inventory {
    fn apply(&mut self, resource: ManagedCluster) {
        let namespace = resource.name_unchecked();
        if namespace == LOCAL_CLUSTER {
            return;
        }

        let claims = cluster_claims(&resource);
        if let Some(entry) = self.clusters.iter_mut().find(|c| c.namespace == namespace) {
            if claims.cluster_id.is_empty() || claims.cluster_id == entry.cluster_id {
                return;
            }
            // The cluster re-registered under a new id; the poll flag moves
            // with it.
            info!(cluster = %namespace, "Updating cluster id in the inventory");
            let previous = std::mem::replace(&mut entry.cluster_id, claims.cluster_id.clone());
            let eligible = self
                .poll_flags
                .remove(&previous)
                .unwrap_or_else(|| claims.poll_eligible());
            self.poll_flags.insert(claims.cluster_id, eligible);
        } else {
            if claims.cluster_id.is_empty() {
                debug!(cluster = %namespace, "Ignoring cluster without an id claim");
                return;
            }
            info!(
                cluster = %namespace,
                eligible = claims.poll_eligible(),
                "Adding cluster to the inventory"
            );
            self.poll_flags
                .insert(claims.cluster_id.clone(), claims.poll_eligible());
            self.clusters.push(ManagedClusterInfo {
                cluster_id: claims.cluster_id,
                namespace,
            });
        }
    }

    fn delete(&mut self, name: String) {
        if name == LOCAL_CLUSTER {
            return;
        }
        if let Some(idx) = self.clusters.iter().position(|c| c.namespace == name) {
            let removed = self.clusters.remove(idx);
            self.poll_flags.remove(&removed.cluster_id);
            info!(cluster = %name, "Removed cluster from the inventory");
        }
    }

    // Applies reindex one cluster at a time, so resets need no special
    // handling.
}
