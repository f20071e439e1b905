use crate::{Inventory, LOCAL_CLUSTER};
use insights_client_k8s_api::cluster::{
    ClusterClaim, ManagedCluster, ManagedClusterSpec, ManagedClusterStatus,
};
use kubert::index::IndexClusterResource;

fn make_cluster(name: &str, claims: &[(&str, &str)]) -> ManagedCluster {
    let mut cluster = ManagedCluster::new(name, ManagedClusterSpec::default());
    cluster.status = Some(ManagedClusterStatus {
        cluster_claims: claims
            .iter()
            .map(|(name, value)| ClusterClaim {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect(),
    });
    cluster
}

fn openshift_cluster(name: &str, id: &str, version: &str) -> ManagedCluster {
    make_cluster(
        name,
        &[
            ("product.open-cluster-management.io", "OpenShift"),
            ("version.openshift.io", version),
            ("id.openshift.io", id),
        ],
    )
}

#[test]
fn adds_an_eligible_openshift_cluster() {
    let mut inventory = Inventory::default();
    inventory.apply(openshift_cluster("c1", "u1", "4.10.3"));

    let clusters = inventory.managed_clusters();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].namespace, "c1");
    assert_eq!(clusters[0].cluster_id, "u1");
    assert!(inventory.is_poll_enabled("u1"));
}

#[test]
fn keeps_ineligible_clusters_without_the_poll_flag() {
    let mut inventory = Inventory::default();
    inventory.apply(make_cluster(
        "c2",
        &[
            ("product.open-cluster-management.io", "EKS"),
            ("id.k8s.io", "u2"),
        ],
    ));

    // The cluster is inventoried (its governance findings still matter) but
    // is not polled against the Insights service.
    assert_eq!(inventory.len(), 1);
    assert!(!inventory.is_poll_enabled("u2"));
}

#[test]
fn openshift_three_is_not_eligible() {
    let mut inventory = Inventory::default();
    inventory.apply(openshift_cluster("c3", "u3", "3.11"));
    assert!(!inventory.is_poll_enabled("u3"));
}

#[test]
fn skips_clusters_without_an_id_claim() {
    let mut inventory = Inventory::default();
    inventory.apply(make_cluster(
        "c4",
        &[("product.open-cluster-management.io", "OpenShift")],
    ));
    assert!(inventory.is_empty());
}

#[test]
fn falls_back_to_the_kubernetes_id_claim() {
    let mut inventory = Inventory::default();
    inventory.apply(make_cluster(
        "c5",
        &[
            ("product.open-cluster-management.io", "OpenShift"),
            ("version.openshift.io", "4.12.0"),
            ("id.k8s.io", "k8s-id"),
        ],
    ));
    assert_eq!(inventory.managed_clusters()[0].cluster_id, "k8s-id");
    assert!(inventory.is_poll_enabled("k8s-id"));
}

#[test]
fn ignores_events_for_the_local_cluster() {
    let mut inventory = Inventory::default();
    inventory.apply(openshift_cluster(LOCAL_CLUSTER, "hub-id", "4.11"));
    assert!(inventory.is_empty());

    inventory.add_local_cluster("hub-id".to_string());
    inventory.delete(LOCAL_CLUSTER.to_string());
    assert_eq!(inventory.local_cluster().as_deref(), Some("hub-id"));
}

#[test]
fn reapplying_the_same_cluster_keeps_one_entry() {
    let mut inventory = Inventory::default();
    inventory.apply(openshift_cluster("c1", "u1", "4.10.3"));
    inventory.apply(openshift_cluster("c1", "u1", "4.10.3"));
    assert_eq!(inventory.len(), 1);
}

#[test]
fn update_swaps_the_cluster_id_and_moves_the_poll_flag() {
    let mut inventory = Inventory::default();
    inventory.apply(openshift_cluster("c4", "old-id", "4.8.2"));
    assert!(inventory.is_poll_enabled("old-id"));

    inventory.apply(openshift_cluster("c4", "new-id", "4.8.2"));

    let clusters = inventory.managed_clusters();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].cluster_id, "new-id");
    assert!(inventory.is_poll_enabled("new-id"));
    assert!(!inventory.is_poll_enabled("old-id"));
}

#[test]
fn update_without_a_prior_entry_is_an_add() {
    let mut inventory = Inventory::default();
    // First event seen for this cluster is an update after an upgrade.
    inventory.apply(openshift_cluster("c6", "u6", "4.6.1"));
    assert_eq!(inventory.len(), 1);
    assert!(inventory.is_poll_enabled("u6"));
}

#[test]
fn delete_removes_the_entry_and_the_flag() {
    let mut inventory = Inventory::default();
    inventory.apply(openshift_cluster("c1", "u1", "4.10.3"));
    inventory.delete("c1".to_string());
    assert!(inventory.is_empty());
    assert!(!inventory.is_poll_enabled("u1"));
}

#[test]
fn local_cluster_is_registered_and_eligible() {
    let mut inventory = Inventory::default();
    assert_eq!(inventory.local_cluster(), None);

    inventory.add_local_cluster("hub-id".to_string());
    assert_eq!(inventory.local_cluster().as_deref(), Some("hub-id"));
    assert!(inventory.is_poll_enabled("hub-id"));

    // Re-registering under a fresh id replaces the entry in place.
    inventory.add_local_cluster("hub-id-2".to_string());
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory.local_cluster().as_deref(), Some("hub-id-2"));
    assert!(!inventory.is_poll_enabled("hub-id"));
}
