use crate::{user_agent, SharedToken};
use ahash::AHashMap as HashMap;
use anyhow::{ensure, Context, Result};
use insights_client_core::ContentsResponse;
use insights_client_k8s_api::{self as k8s, ConfigMap, ObjectMeta, PostParams};
use parking_lot::RwLock;
use reqwest::{header, StatusCode};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// ConfigMap holding the JSON-serialized rule-content snapshot for offline
/// consumers.
pub const CONTENT_CONFIGMAP: &str = "insight-content-data";

/// Sleep schedule for the content bootstrap: grows with the retry count,
/// capped at five minutes.
pub fn backoff_secs(retry: u64) -> u64 {
    (retry * 2).min(300)
}

/// The in-memory rule-content mapping: error key to flattened attribute bag.
///
/// Each bag merges the rule's summary/reason/resolution with the per-key
/// attributes, spreading the `metadata` sub-object into the top level.
#[derive(Debug, Default)]
pub struct ContentMap {
    contents: RwLock<HashMap<String, Map<String, Value>>>,
}

impl ContentMap {
    /// Replaces the mapping from a content response; returns the number of
    /// keys stored. Malformed entries are dropped individually.
    pub fn replace(&self, response: ContentsResponse) -> usize {
        let mut flattened: HashMap<String, Map<String, Value>> = HashMap::default();
        for entry in response.content {
            for (key, value) in &entry.error_keys {
                let Some(attributes) = value.as_object() else {
                    warn!(key = %key, "Ignoring malformed rule-content entry");
                    continue;
                };
                let mut bag = Map::new();
                bag.insert("summary".to_string(), Value::String(entry.summary.clone()));
                bag.insert("reason".to_string(), Value::String(entry.reason.clone()));
                bag.insert(
                    "resolution".to_string(),
                    Value::String(entry.resolution.clone()),
                );
                for (field, field_value) in attributes {
                    if field == "metadata" {
                        if let Some(metadata) = field_value.as_object() {
                            bag.extend(metadata.clone());
                        }
                    } else {
                        bag.insert(field.clone(), field_value.clone());
                    }
                }
                flattened.insert(key.clone(), bag);
            }
        }
        let stored = flattened.len();
        *self.contents.write() = flattened;
        stored
    }

    /// The value of one field of one error key's bag.
    pub fn get(&self, key: &str, field: &str) -> Option<Value> {
        self.contents
            .read()
            .get(key)
            .and_then(|bag| bag.get(field))
            .cloned()
    }

    /// The populated field names of one error key's bag.
    pub fn fields(&self, key: &str) -> Vec<String> {
        self.contents
            .read()
            .get(key)
            .map(|bag| bag.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.contents.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.contents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.read().is_empty()
    }

    fn snapshot_data(&self) -> Result<BTreeMap<String, String>> {
        self.contents
            .read()
            .iter()
            .map(|(key, bag)| {
                let serialized = serde_json::to_string(bag)?;
                Ok((key.clone(), serialized))
            })
            .collect()
    }
}

/// Fetches the global rule catalog and keeps [`ContentMap`] current, writing
/// a ConfigMap snapshot after each successful refresh.
///
/// `refresh` is the single entry point for both the startup bootstrap and the
/// reconciler's cache-miss path.
pub struct ContentStore {
    map: ContentMap,
    http: reqwest::Client,
    content_url: String,
    hub_id: String,
    token: SharedToken,
    client: k8s::Client,
    pod_namespace: String,
}

impl ContentStore {
    pub fn new(
        http: reqwest::Client,
        content_url: String,
        hub_id: String,
        token: SharedToken,
        client: k8s::Client,
        pod_namespace: String,
    ) -> Self {
        Self {
            map: ContentMap::default(),
            http,
            content_url,
            hub_id,
            token,
            client,
            pod_namespace,
        }
    }

    pub fn contents(&self) -> &ContentMap {
        &self.map
    }

    /// Fetches the catalog, replaces the mapping and snapshots it. A snapshot
    /// failure does not fail the refresh; the in-memory state is already
    /// current and the next refresh rewrites the ConfigMap.
    pub async fn refresh(&self) -> Result<usize> {
        debug!(url = %self.content_url, "Retrieving rule content");
        let token = self.token.read().clone();
        let response = self
            .http
            .get(&self.content_url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, user_agent(&self.hub_id))
            .header(header::AUTHORIZATION, token)
            .send()
            .await
            .context("content request failed")?;
        let status = response.status();
        ensure!(
            status == StatusCode::OK,
            "content request returned {status}"
        );
        let contents: ContentsResponse = response
            .json()
            .await
            .context("failed to decode the content response")?;

        let stored = self.map.replace(contents);
        if let Err(error) = self.snapshot().await {
            warn!(%error, "Failed to store the rule-content snapshot");
        }
        Ok(stored)
    }

    async fn snapshot(&self) -> Result<()> {
        let configmap = ConfigMap {
            metadata: ObjectMeta {
                name: Some(CONTENT_CONFIGMAP.to_string()),
                namespace: Some(self.pod_namespace.clone()),
                ..Default::default()
            },
            data: Some(self.map.snapshot_data()?),
            ..Default::default()
        };

        let api = k8s::Api::<ConfigMap>::namespaced(self.client.clone(), &self.pod_namespace);
        match api.get_opt(CONTENT_CONFIGMAP).await? {
            Some(existing) => {
                let mut replacement = configmap;
                replacement.metadata.resource_version = existing.metadata.resource_version;
                api.replace(CONTENT_CONFIGMAP, &PostParams::default(), &replacement)
                    .await?;
            }
            None => {
                api.create(&PostParams::default(), &configmap).await?;
            }
        }
        info!(
            namespace = %self.pod_namespace,
            "Stored rule content in the {CONTENT_CONFIGMAP} ConfigMap"
        );
        Ok(())
    }
}
