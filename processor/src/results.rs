use chrono::Utc;
use insights_client_core::{ManagedClusterInfo, ReportData};
use insights_client_k8s_api::report::{
    PolicyReport, PolicyReportResult, PolicyReportSummary, Timestamp,
};
use insights_client_k8s_api::{ObjectMeta, ObjectReference};
use insights_client_retriever::ContentMap;
use serde_json::Value;
use std::collections::BTreeMap;

pub const SOURCE_INSIGHTS: &str = "insights";
pub const SOURCE_GRC: &str = "grc";
pub const RESULT_FAIL: &str = "fail";

/// Findings from rule modules matching this marker are training material, not
/// real violations, and never surface in a report.
pub(crate) const TUTORIAL_RULE: &str = "tutorial_rule";

pub fn report_name(namespace: &str) -> String {
    format!("{namespace}-policyreport")
}

pub(crate) fn now_timestamp() -> Timestamp {
    let now = Utc::now();
    Timestamp {
        seconds: now.timestamp(),
        nanos: now.timestamp_subsec_nanos() as i32,
    }
}

/// Composes the result for one Insights finding, or None when the finding is
/// filtered (tutorial rule) or its key has no rule content.
pub(crate) fn insights_result(
    contents: &ContentMap,
    report: &ReportData,
) -> Option<PolicyReportResult> {
    if report.component.contains(TUTORIAL_RULE) {
        return None;
    }
    if !contents.contains(&report.key) {
        return None;
    }

    let description = contents
        .get(&report.key, "description")
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| report.description.clone());
    let tags = contents
        .get(&report.key, "tags")
        .map(|value| string_slice(&value))
        .unwrap_or_default();
    let category = tags
        .iter()
        .filter(|tag| *tag != "openshift")
        .cloned()
        .collect::<Vec<_>>()
        .join(",");
    let total_risk = contents
        .get(&report.key, "total_risk")
        .and_then(|value| value.as_i64())
        .unwrap_or(report.total_risk);

    let mut properties = BTreeMap::new();
    properties.insert("created_at".to_string(), report.created_at.clone());
    properties.insert("total_risk".to_string(), total_risk.to_string());
    properties.insert("component".to_string(), report.component.clone());
    if !report.details.is_null() {
        if let Ok(details) = serde_json::to_string(&report.details) {
            properties.insert("extra_data".to_string(), details);
        }
    }

    Some(PolicyReportResult {
        policy: report.key.clone(),
        description,
        category,
        source: SOURCE_INSIGHTS.to_string(),
        result: RESULT_FAIL.to_string(),
        scored: false,
        timestamp: Some(now_timestamp()),
        properties,
    })
}

fn string_slice(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// The full desired PolicyReport for a cluster's combined findings.
pub fn build_policy_report(
    cluster: &ManagedClusterInfo,
    results: Vec<PolicyReportResult>,
) -> PolicyReport {
    PolicyReport {
        metadata: ObjectMeta {
            name: Some(report_name(&cluster.namespace)),
            namespace: Some(cluster.namespace.clone()),
            ..Default::default()
        },
        scope: Some(ObjectReference {
            kind: Some("cluster".to_string()),
            name: Some(cluster.namespace.clone()),
            namespace: Some(cluster.namespace.clone()),
            ..Default::default()
        }),
        summary: Some(PolicyReportSummary {
            fail: results.len() as i64,
            ..Default::default()
        }),
        results,
        ..Default::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Create,
    Apply,
    Delete,
}

/// The convergence table: the declared PolicyReport exists iff the combined
/// findings are non-empty.
pub fn convergence_action(
    current: Option<&PolicyReport>,
    combined: &[PolicyReportResult],
) -> Action {
    match (current, combined.is_empty()) {
        (None, true) => Action::NoOp,
        (None, false) => Action::Create,
        (Some(_), false) => Action::Apply,
        (Some(_), true) => Action::Delete,
    }
}
