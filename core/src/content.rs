use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope returned by the rule-content endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ContentsResponse {
    #[serde(default)]
    pub content: Vec<ContentEntry>,
}

/// One rule's content: a summary/reason/resolution trio shared by each of the
/// rule's error keys. The per-key values are free-form attribute bags whose
/// `metadata` sub-object is flattened by the content cache.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ContentEntry {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub error_keys: Map<String, Value>,
}
