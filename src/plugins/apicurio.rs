//! Example `CustomSource` backed by an Apicurio Registry instance, configured purely
//! from the `APICURIO_OPTIONS` environment variable (`"k1=v1;k2=v2"`).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::types::VersionMap;

use super::{CustomSource, PluginSchema};

const DEFAULT_APICURIO_URL: &str = "http://localhost:8081/api";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactMeta {
    id: String,
    version: u32,
    global_id: u32,
    #[serde(rename = "type")]
    schema_type: String,
}

/// Parses `APICURIO_OPTIONS="k1=v1;k2=v2"` into its key/value pairs.
pub fn parse_options(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| entry.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub struct ApicurioSource {
    http: reqwest::Client,
    base_url: String,
}

impl ApicurioSource {
    pub fn new(options: &HashMap<String, String>) -> Self {
        let base_url = options
            .get("apicurioUrl")
            .map(|url| format!("{}/api", url.trim_end_matches('/')))
            .unwrap_or_else(|| DEFAULT_APICURIO_URL.to_string());

        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn from_env() -> Self {
        let options = std::env::var("APICURIO_OPTIONS")
            .ok()
            .map(|raw| parse_options(&raw))
            .unwrap_or_default();
        Self::new(&options)
    }
}

#[async_trait]
impl CustomSource for ApicurioSource {
    async fn set_up(&mut self) -> anyhow::Result<()> {
        tracing::info!(url = %self.base_url, "starting apicurio custom source");
        Ok(())
    }

    async fn tear_down(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_source_state(&self) -> anyhow::Result<VersionMap> {
        let artifact_ids: Vec<String> = self
            .http
            .get(format!("{}/artifacts", self.base_url))
            .send()
            .await?
            .json()
            .await?;

        let mut state = VersionMap::new();

        for artifact_id in artifact_ids {
            let versions: Vec<u32> = self
                .http
                .get(format!("{}/artifacts/{}/versions", self.base_url, artifact_id))
                .send()
                .await?
                .json()
                .await?;

            let mut global_ids = Vec::with_capacity(versions.len());
            for version in versions {
                let meta: ArtifactMeta = self
                    .http
                    .get(format!(
                        "{}/artifacts/{}/versions/{}/meta",
                        self.base_url, artifact_id, version
                    ))
                    .send()
                    .await?
                    .json()
                    .await?;

                if matches!(meta.schema_type.as_str(), "AVRO" | "JSON" | "PROTOBUF") {
                    global_ids.push(meta.global_id);
                }
            }

            if !global_ids.is_empty() {
                state.insert(artifact_id, global_ids);
            }
        }

        Ok(state)
    }

    async fn get_schema(&self, schema_source_id: u32) -> anyhow::Result<PluginSchema> {
        let meta: ArtifactMeta = self
            .http
            .get(format!("{}/ids/{}/meta", self.base_url, schema_source_id))
            .send()
            .await?
            .json()
            .await?;

        let schema = self
            .http
            .get(format!("{}/ids/{}", self.base_url, schema_source_id))
            .send()
            .await?
            .text()
            .await?;

        Ok(PluginSchema {
            subject: meta.id,
            version: meta.version,
            id: meta.global_id,
            schema_type: meta.schema_type.parse().map_err(|e: crate::error::RegistryError| anyhow::anyhow!(e))?,
            schema,
            references: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_semicolon_separated_options() {
        let parsed = parse_options("apicurioUrl=http://localhost:9000;foo=bar");
        assert_eq!(parsed.get("apicurioUrl").map(String::as_str), Some("http://localhost:9000"));
        assert_eq!(parsed.get("foo").map(String::as_str), Some("bar"));
    }

    #[test]
    fn defaults_when_unset() {
        let source = ApicurioSource::new(&HashMap::new());
        assert_eq!(source.base_url, DEFAULT_APICURIO_URL);
    }
}
