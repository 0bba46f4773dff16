use async_trait::async_trait;

use crate::error::RegistryError;
use crate::types::Mode;

/// Global and per-subject IMPORT/READONLY/READWRITE mode.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModeAPI: Send + Sync {
    async fn get_mode(&self) -> Result<Mode, RegistryError>;

    async fn set_mode(&self, mode: Mode) -> Result<(), RegistryError>;

    async fn is_import_mode(&self) -> Result<bool, RegistryError>;
}
