use async_trait::async_trait;

use crate::error::RegistryError;
use crate::types::CompatibilityLevel;

/// Global compatibility policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompatibilityAPI: Send + Sync {
    async fn get_global_compatibility(&self) -> Result<CompatibilityLevel, RegistryError>;

    async fn set_global_compatibility(&self, level: CompatibilityLevel) -> Result<(), RegistryError>;

    async fn is_none_compat(&self) -> Result<bool, RegistryError>;
}
