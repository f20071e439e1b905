use crate::results::{now_timestamp, RESULT_FAIL, SOURCE_GRC};
use insights_client_core::severity;
use insights_client_k8s_api::policy::{
    Policy, PolicyTemplate, CATEGORY_ANNOTATION, NON_COMPLIANT, POLICY_API_GROUP,
    SEVERITY_ANNOTATION,
};
use insights_client_k8s_api::report::PolicyReportResult;
use insights_client_k8s_api::ResourceExt;
use serde_json::Value;
use std::collections::BTreeMap;

/// One result per NonCompliant detail of each NonCompliant policy.
pub(crate) fn governance_results(policies: &[Policy]) -> Vec<PolicyReportResult> {
    let mut results = Vec::new();
    for policy in policies {
        let Some(status) = policy.status.as_ref() else {
            continue;
        };
        if status.compliant.as_deref() != Some(NON_COMPLIANT) {
            continue;
        }
        let category = policy
            .annotations()
            .get(CATEGORY_ANNOTATION)
            .cloned()
            .unwrap_or_default();
        for detail in &status.details {
            if detail.compliant.as_deref() != Some(NON_COMPLIANT) {
                continue;
            }
            let description = detail
                .history
                .first()
                .map(|event| event.message.clone())
                .unwrap_or_default();
            let template_name = detail
                .template_meta
                .as_ref()
                .map(|meta| meta.name.as_str())
                .unwrap_or_default();
            let severity = template_severity(&policy.spec.policy_templates, template_name)
                .unwrap_or_default();

            let mut properties = BTreeMap::new();
            properties.insert(
                "total_risk".to_string(),
                severity::total_risk(&severity).to_string(),
            );
            if let Some(timestamp) = detail.history.first().and_then(|event| event.last_timestamp.clone())
            {
                properties.insert("created_at".to_string(), timestamp);
            }

            results.push(PolicyReportResult {
                policy: policy.name_unchecked(),
                description,
                category: category.clone(),
                source: SOURCE_GRC.to_string(),
                result: RESULT_FAIL.to_string(),
                scored: false,
                timestamp: Some(now_timestamp()),
                properties,
            });
        }
    }
    results
}

/// Severity of the template a compliance detail refers to.
///
/// Templates from the policy API group declare it at `spec.severity`; other
/// template kinds carry it in the severity annotation. The objectDefinition
/// is free-form, so every step of the traversal is checked.
fn template_severity(templates: &[PolicyTemplate], template_name: &str) -> Option<String> {
    if template_name.is_empty() {
        return None;
    }
    let definition = templates
        .iter()
        .map(|template| &template.object_definition)
        .find(|definition| {
            definition
                .get("metadata")
                .and_then(|metadata| metadata.get("name"))
                .and_then(Value::as_str)
                == Some(template_name)
        })?;

    let api_version = definition
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let severity = if api_version.starts_with(POLICY_API_GROUP) {
        definition
            .get("spec")
            .and_then(|spec| spec.get("severity"))
            .and_then(Value::as_str)
    } else {
        definition
            .get("metadata")
            .and_then(|metadata| metadata.get("annotations"))
            .and_then(|annotations| annotations.get(SEVERITY_ANNOTATION))
            .and_then(Value::as_str)
    };
    severity.map(str::to_string)
}
