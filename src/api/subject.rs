use async_trait::async_trait;

use crate::error::RegistryError;
use crate::types::{DeleteOutcome, RegisterOutcome, SchemaRecord, SubjectVersion, UnregisteredSchema};

/// Operations scoped to a single subject's versions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubjectAPI: Send + Sync {
    async fn list_subjects(&self, include_soft_deleted: bool) -> Result<Vec<String>, RegistryError>;

    async fn list_versions(
        &self,
        subject: &str,
        include_soft_deleted: bool,
    ) -> Result<Vec<u32>, RegistryError>;

    async fn get_schema(
        &self,
        subject: &str,
        version: u32,
        include_soft_deleted: bool,
    ) -> Result<SchemaRecord, RegistryError>;

    async fn register(
        &self,
        subject: &str,
        schema: &UnregisteredSchema,
    ) -> Result<RegisterOutcome, RegistryError>;

    async fn soft_delete(&self, subject: &str, version: u32) -> Result<DeleteOutcome, RegistryError>;

    async fn hard_delete(&self, subject: &str, version: u32) -> Result<DeleteOutcome, RegistryError>;

    async fn delete_subject(&self, subject: &str, permanent: bool) -> Result<Vec<u32>, RegistryError>;

    async fn referenced_by(&self, subject: &str, version: u32) -> Result<Vec<u32>, RegistryError>;

    async fn subject_versions_for_id(&self, id: u32) -> Result<Vec<SubjectVersion>, RegistryError>;

    async fn schema_exists_under_subject(
        &self,
        subject: &str,
        schema: &UnregisteredSchema,
    ) -> Result<bool, RegistryError>;
}
