//! Example `CustomDestination` that holds replicated schemas in memory, illustrating
//! the contract without needing a real third-party registry to talk to.

use async_trait::async_trait;

use crate::types::VersionMap;

use super::{CustomDestination, PluginSchema};

#[derive(Debug, Default)]
pub struct InMemoryDestination {
    state: VersionMap,
}

impl InMemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomDestination for InMemoryDestination {
    async fn set_up(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn tear_down(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_destination_state(&self) -> anyhow::Result<VersionMap> {
        Ok(self.state.clone())
    }

    async fn register_schema(&mut self, schema: &PluginSchema) -> anyhow::Result<()> {
        self.state.entry(schema.subject.clone()).or_default().push(schema.version);
        Ok(())
    }

    async fn delete_schema(&mut self, schema: &PluginSchema) -> anyhow::Result<()> {
        if let Some(versions) = self.state.get_mut(&schema.subject) {
            versions.retain(|&v| v != schema.version);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(subject: &str, version: u32) -> PluginSchema {
        PluginSchema {
            subject: subject.to_string(),
            version,
            id: version,
            schema_type: crate::types::SchemaType::Avro,
            schema: "{}".to_string(),
            references: Vec::new(),
        }
    }

    #[tokio::test]
    async fn registers_and_deletes_schemas() {
        let mut dest = InMemoryDestination::new();
        dest.register_schema(&schema("a-value", 1)).await.unwrap();
        dest.register_schema(&schema("a-value", 2)).await.unwrap();

        let state = dest.get_destination_state().await.unwrap();
        assert_eq!(state.get("a-value"), Some(&vec![1, 2]));

        dest.delete_schema(&schema("a-value", 1)).await.unwrap();
        let state = dest.get_destination_state().await.unwrap();
        assert_eq!(state.get("a-value"), Some(&vec![2]));
    }
}
