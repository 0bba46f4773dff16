use async_trait::async_trait;

use crate::error::RegistryError;
use crate::types::IdMap;

/// Registry-wide schema listing, not scoped to any one subject.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchemaAPI: Send + Sync {
    async fn reachable(&self) -> bool;

    async fn list_all_schemas(&self, include_soft_deleted: bool) -> Result<IdMap, RegistryError>;
}
