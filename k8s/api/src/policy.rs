use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const POLICY_API_GROUP: &str = "policy.open-cluster-management.io";

/// Annotation carrying the comma-separated compliance categories.
pub const CATEGORY_ANNOTATION: &str = "policy.open-cluster-management.io/categories";

/// Annotation carrying the severity for templates outside the policy group.
pub const SEVERITY_ANNOTATION: &str = "policy.open-cluster-management.io/severity";

pub const NON_COMPLIANT: &str = "NonCompliant";

/// A governance policy distributed to a managed cluster. Only the compliance
/// status and the severity carried by the templates matter here; the template
/// payloads themselves stay untyped.
#[derive(Clone, Debug, Default, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "policy.open-cluster-management.io",
    version = "v1",
    kind = "Policy",
    status = "PolicyStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_action: Option<String>,
    /// Embedded objectDefinitions are arbitrary objects; they are traversed
    /// with checked accessors, never deserialized into fixed shapes.
    #[serde(rename = "policy-templates", default, skip_serializing_if = "Vec::is_empty")]
    pub policy_templates: Vec<PolicyTemplate>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTemplate {
    #[serde(default)]
    pub object_definition: Value,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ComplianceDetail>,
}

/// Per-template compliance, with the event history most recent first.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_meta: Option<TemplateMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ComplianceHistory>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct TemplateMeta {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceHistory {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}
