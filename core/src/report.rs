use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope returned by the per-cluster reports endpoint.
///
/// Every field defaults so that a partially filled response still parses; a
/// malformed unit drops only itself, never the poll cycle.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub report: ReportBody,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ReportBody {
    #[serde(default)]
    pub data: Vec<ReportData>,
    #[serde(default)]
    pub meta: ReportMeta,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ReportMeta {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gathered_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<String>,
    #[serde(default)]
    pub managed: bool,
}

/// A single Insights finding for one cluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ReportData {
    #[serde(default)]
    pub rule_id: String,
    /// Stable identifier joining this finding to its rule-content entry.
    #[serde(default)]
    pub key: String,
    /// The rule module that emitted the finding.
    #[serde(default)]
    pub component: String,
    /// Rule-specific payload; passed through verbatim as `extra_data`.
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub total_risk: i64,
    #[serde(default)]
    pub publish_date: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub disabled: bool,
}
