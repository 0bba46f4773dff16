//! Plug-in contracts for registries this tool doesn't speak natively. A `CustomSource`
//! stands in for the registry client on the read side; a `CustomDestination` stands in
//! for it on the write side. The engine drives either the same way it drives a real
//! `RegistryClient`: materialize state, diff, replay the difference.

pub mod apicurio;
pub mod memory;

use async_trait::async_trait;

use crate::types::{Reference, SchemaType, VersionMap};

/// One schema as seen through a plug-in boundary: enough to register it verbatim at a
/// real destination, or to hold it in a destination plug-in's own state.
#[derive(Debug, Clone)]
pub struct PluginSchema {
    pub subject: String,
    pub version: u32,
    pub id: u32,
    pub schema_type: SchemaType,
    pub schema: String,
    pub references: Vec<Reference>,
}

/// A read-only stand-in for a source registry. `get_source_state` reports subjects
/// mapped to opaque per-schema identifiers (not necessarily registry versions); the
/// engine diffs this against the destination's state and fetches only what's missing.
#[async_trait]
pub trait CustomSource: Send + Sync {
    async fn set_up(&mut self) -> anyhow::Result<()>;

    async fn tear_down(&mut self) -> anyhow::Result<()>;

    async fn get_source_state(&self) -> anyhow::Result<VersionMap>;

    async fn get_schema(&self, schema_source_id: u32) -> anyhow::Result<PluginSchema>;
}

/// A write-only stand-in for a destination registry.
#[async_trait]
pub trait CustomDestination: Send + Sync {
    async fn set_up(&mut self) -> anyhow::Result<()>;

    async fn tear_down(&mut self) -> anyhow::Result<()>;

    async fn get_destination_state(&self) -> anyhow::Result<VersionMap>;

    async fn register_schema(&mut self, schema: &PluginSchema) -> anyhow::Result<()>;

    async fn delete_schema(&mut self, schema: &PluginSchema) -> anyhow::Result<()>;
}
