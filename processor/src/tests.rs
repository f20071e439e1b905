use crate::policies::governance_results;
use crate::results::{convergence_action, insights_result, Action};
use crate::{build_policy_report, report_name, RESULT_FAIL, SOURCE_GRC, SOURCE_INSIGHTS};
use insights_client_core::{ContentsResponse, ManagedClusterInfo, ReportData};
use insights_client_k8s_api::policy::Policy;
use insights_client_k8s_api::report::PolicyReport;
use insights_client_retriever::ContentMap;
use serde_json::json;

fn sample_contents() -> ContentMap {
    let contents = ContentMap::default();
    let response: ContentsResponse = serde_json::from_value(json!({
        "content": [{
            "summary": "Sum",
            "reason": "Why",
            "resolution": "Fix",
            "error_keys": {
                "K": {
                    "metadata": {
                        "description": "Node is degraded",
                        "tags": ["openshift", "service_availability"],
                        "total_risk": 2,
                    },
                },
            },
        }],
    }))
    .unwrap();
    contents.replace(response);
    contents
}

fn sample_report(key: &str, component: &str) -> ReportData {
    ReportData {
        rule_id: "degraded.report".to_string(),
        key: key.to_string(),
        component: component.to_string(),
        details: json!({"nodes": ["n1"]}),
        created_at: "2024-05-01T10:00:00Z".to_string(),
        total_risk: 1,
        ..Default::default()
    }
}

fn noncompliant_policy(severity_source: serde_json::Value) -> Policy {
    serde_json::from_value(json!({
        "apiVersion": "policy.open-cluster-management.io/v1",
        "kind": "Policy",
        "metadata": {
            "name": "pol-encryption",
            "namespace": "c2",
            "annotations": {
                "policy.open-cluster-management.io/categories": "SC System and Communications Protection",
            },
        },
        "spec": {
            "disabled": false,
            "policy-templates": [severity_source],
        },
        "status": {
            "compliant": "NonCompliant",
            "details": [{
                "compliant": "NonCompliant",
                "templateMeta": { "name": "pol-encryption-cfg" },
                "history": [
                    { "message": "etcd encryption is disabled", "lastTimestamp": "2024-05-01T09:00:00Z" },
                    { "message": "older event" },
                ],
            }],
        },
    }))
    .unwrap()
}

#[test]
fn composes_an_insights_result() {
    let contents = sample_contents();
    let result = insights_result(&contents, &sample_report("K", "foo.bar")).unwrap();

    assert_eq!(result.policy, "K");
    assert_eq!(result.description, "Node is degraded");
    assert_eq!(result.source, SOURCE_INSIGHTS);
    assert_eq!(result.result, RESULT_FAIL);
    assert!(!result.scored);
    assert_eq!(result.properties["component"], "foo.bar");
    assert_eq!(result.properties["created_at"], "2024-05-01T10:00:00Z");
    assert_eq!(result.properties["total_risk"], "2");
    assert_eq!(result.properties["extra_data"], r#"{"nodes":["n1"]}"#);
}

#[test]
fn tutorial_rules_are_filtered() {
    let contents = sample_contents();
    let report = sample_report("K", "ccx_rules_ocp.tutorial_rule.report");
    assert!(insights_result(&contents, &report).is_none());
}

#[test]
fn category_drops_the_openshift_tag() {
    let contents = sample_contents();
    let result = insights_result(&contents, &sample_report("K", "foo.bar")).unwrap();
    assert_eq!(result.category, "service_availability");
    assert!(!result.category.contains("openshift"));
}

#[test]
fn findings_without_content_are_dropped() {
    let contents = sample_contents();
    assert!(insights_result(&contents, &sample_report("unknown", "foo.bar")).is_none());
}

#[test]
fn governance_results_map_policy_group_severity() {
    let policy = noncompliant_policy(json!({
        "objectDefinition": {
            "apiVersion": "policy.open-cluster-management.io/v1",
            "kind": "ConfigurationPolicy",
            "metadata": { "name": "pol-encryption-cfg" },
            "spec": { "severity": "critical" },
        },
    }));

    let results = governance_results(&[policy]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].policy, "pol-encryption");
    assert_eq!(results[0].source, SOURCE_GRC);
    assert_eq!(results[0].result, RESULT_FAIL);
    assert!(!results[0].scored);
    assert_eq!(results[0].description, "etcd encryption is disabled");
    assert_eq!(
        results[0].category,
        "SC System and Communications Protection"
    );
    assert_eq!(results[0].properties["total_risk"], "4");
    assert_eq!(results[0].properties["created_at"], "2024-05-01T09:00:00Z");
}

#[test]
fn governance_results_use_the_severity_annotation_for_foreign_templates() {
    let policy = noncompliant_policy(json!({
        "objectDefinition": {
            "apiVersion": "constraints.gatekeeper.sh/v1beta1",
            "kind": "K8sRequiredLabels",
            "metadata": {
                "name": "pol-encryption-cfg",
                "annotations": { "policy.open-cluster-management.io/severity": "Medium" },
            },
        },
    }));

    let results = governance_results(&[policy]);
    assert_eq!(results[0].properties["total_risk"], "2");
}

#[test]
fn missing_template_match_maps_to_zero() {
    let policy = noncompliant_policy(json!({
        "objectDefinition": {
            "apiVersion": "policy.open-cluster-management.io/v1",
            "kind": "ConfigurationPolicy",
            "metadata": { "name": "other-template" },
            "spec": { "severity": "critical" },
        },
    }));

    // The detail references a template the policy does not carry, so no
    // severity resolves.
    let results = governance_results(&[policy]);
    assert_eq!(results[0].properties["total_risk"], "0");
}

#[test]
fn unrecognized_severity_maps_to_zero() {
    let policy = noncompliant_policy(json!({
        "objectDefinition": {
            "apiVersion": "policy.open-cluster-management.io/v1",
            "kind": "ConfigurationPolicy",
            "metadata": { "name": "pol-encryption-cfg" },
            "spec": { "severity": "catastrophic" },
        },
    }));

    let results = governance_results(&[policy]);
    assert_eq!(results[0].properties["total_risk"], "0");
}

#[test]
fn compliant_policies_yield_no_results() {
    let mut policy = noncompliant_policy(json!({"objectDefinition": {}}));
    policy.status.as_mut().unwrap().compliant = Some("Compliant".to_string());
    assert!(governance_results(&[policy]).is_empty());
}

#[test]
fn convergence_follows_the_table() {
    let current = PolicyReport::default();
    let finding = insights_result(&sample_contents(), &sample_report("K", "foo.bar")).unwrap();

    assert_eq!(convergence_action(None, &[]), Action::NoOp);
    assert_eq!(convergence_action(None, &[finding.clone()]), Action::Create);
    assert_eq!(
        convergence_action(Some(&current), &[finding]),
        Action::Apply
    );
    assert_eq!(convergence_action(Some(&current), &[]), Action::Delete);
}

#[test]
fn report_name_is_suffixed() {
    assert_eq!(report_name("c1"), "c1-policyreport");
}

#[test]
fn build_policy_report_fills_scope_and_summary() {
    let cluster = ManagedClusterInfo {
        cluster_id: "u1".to_string(),
        namespace: "c1".to_string(),
    };
    let contents = sample_contents();
    let results = vec![insights_result(&contents, &sample_report("K", "foo.bar")).unwrap()];

    let report = build_policy_report(&cluster, results);
    assert_eq!(report.metadata.name.as_deref(), Some("c1-policyreport"));
    assert_eq!(report.metadata.namespace.as_deref(), Some("c1"));

    let scope = report.scope.unwrap();
    assert_eq!(scope.kind.as_deref(), Some("cluster"));
    assert_eq!(scope.name.as_deref(), Some("c1"));
    assert_eq!(scope.namespace.as_deref(), Some("c1"));

    assert_eq!(report.summary.unwrap().fail, 1);
    assert_eq!(report.results.len(), 1);
}
