//! Fans concurrent fetches out across a registry's subjects to build a `Snapshot`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::api::RegistryClient;
use crate::diff::id_diff;
use crate::filter::SubjectFilter;
use crate::types::{IdMap, Snapshot, VersionMap};

/// Delay between scheduling consecutive version-fetch tasks; the sole rate limit on
/// fan-out, protecting the upstream registry from burst traffic.
const SCHEDULING_DELAY: Duration = Duration::from_millis(2);

const RESULT_CHANNEL_CAPACITY: usize = 256;

/// Materializes `{subject -> [version]}` for one registry, applying `filter` to the
/// subject list before fanning out. Each subject's version fetch runs as its own task;
/// tasks are spawned `SCHEDULING_DELAY` apart and report back over a bounded channel.
pub async fn materialize<C>(
    client: &Arc<C>,
    filter: &SubjectFilter,
    include_soft_deleted: bool,
) -> Result<Snapshot, crate::error::RegistryError>
where
    C: RegistryClient + 'static,
{
    let subjects = client.list_subjects(include_soft_deleted).await?;
    let subjects = filter.apply(subjects);

    let (tx, mut rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);

    for subject in subjects {
        let client = Arc::clone(client);
        let tx = tx.clone();

        tokio::spawn(async move {
            let result = client.list_versions(&subject, include_soft_deleted).await;
            let _ = tx.send((subject, result)).await;
        });

        tokio::time::sleep(SCHEDULING_DELAY).await;
    }

    drop(tx);

    let mut subjects_map = VersionMap::new();

    while let Some((subject, result)) = rx.recv().await {
        match result {
            Ok(versions) => {
                subjects_map.insert(subject, versions);
            }
            Err(error) => {
                tracing::warn!(%subject, %error, "failed to fetch versions for subject, skipping for this tick");
            }
        }
    }

    Ok(Snapshot::new(subjects_map))
}

/// Materializes the soft-deleted-only view of a registry: the per-id set difference
/// between the full dump with deletions and the full dump without.
pub async fn materialize_soft_deleted<C>(client: &C) -> Result<IdMap, crate::error::RegistryError>
where
    C: RegistryClient + ?Sized,
{
    let with_deleted = client.list_all_schemas(true).await?;
    let without_deleted = client.list_all_schemas(false).await?;

    Ok(id_diff(&with_deleted, &without_deleted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        pub Client {}

        #[async_trait]
        impl crate::api::subject::SubjectAPI for Client {
            async fn list_subjects(&self, include_soft_deleted: bool) -> Result<Vec<String>, crate::error::RegistryError>;
            async fn list_versions(&self, subject: &str, include_soft_deleted: bool) -> Result<Vec<u32>, crate::error::RegistryError>;
            async fn get_schema(&self, subject: &str, version: u32, include_soft_deleted: bool) -> Result<crate::types::SchemaRecord, crate::error::RegistryError>;
            async fn register(&self, subject: &str, schema: &crate::types::UnregisteredSchema) -> Result<crate::types::RegisterOutcome, crate::error::RegistryError>;
            async fn soft_delete(&self, subject: &str, version: u32) -> Result<crate::types::DeleteOutcome, crate::error::RegistryError>;
            async fn hard_delete(&self, subject: &str, version: u32) -> Result<crate::types::DeleteOutcome, crate::error::RegistryError>;
            async fn delete_subject(&self, subject: &str, permanent: bool) -> Result<Vec<u32>, crate::error::RegistryError>;
            async fn referenced_by(&self, subject: &str, version: u32) -> Result<Vec<u32>, crate::error::RegistryError>;
            async fn subject_versions_for_id(&self, id: u32) -> Result<Vec<crate::types::SubjectVersion>, crate::error::RegistryError>;
            async fn schema_exists_under_subject(&self, subject: &str, schema: &crate::types::UnregisteredSchema) -> Result<bool, crate::error::RegistryError>;
        }

        #[async_trait]
        impl crate::api::mode::ModeAPI for Client {
            async fn get_mode(&self) -> Result<crate::types::Mode, crate::error::RegistryError>;
            async fn set_mode(&self, mode: crate::types::Mode) -> Result<(), crate::error::RegistryError>;
            async fn is_import_mode(&self) -> Result<bool, crate::error::RegistryError>;
        }

        #[async_trait]
        impl crate::api::compatibility::CompatibilityAPI for Client {
            async fn get_global_compatibility(&self) -> Result<crate::types::CompatibilityLevel, crate::error::RegistryError>;
            async fn set_global_compatibility(&self, level: crate::types::CompatibilityLevel) -> Result<(), crate::error::RegistryError>;
            async fn is_none_compat(&self) -> Result<bool, crate::error::RegistryError>;
        }

        #[async_trait]
        impl crate::api::schema::SchemaAPI for Client {
            async fn reachable(&self) -> bool;
            async fn list_all_schemas(&self, include_soft_deleted: bool) -> Result<crate::types::IdMap, crate::error::RegistryError>;
        }
    }

    #[tokio::test]
    async fn materializes_an_unfiltered_subject_list() {
        let mut client = MockClient::new();

        client
            .expect_list_subjects()
            .returning(|_| Ok(vec!["a-value".to_string(), "b-value".to_string()]));
        client
            .expect_list_versions()
            .withf(|s, _| s == "a-value")
            .returning(|_, _| Ok(vec![1, 2]));
        client
            .expect_list_versions()
            .withf(|s, _| s == "b-value")
            .returning(|_, _| Ok(vec![1]));

        let client = Arc::new(client);
        let snapshot = materialize(&client, &SubjectFilter::Unrestricted, false)
            .await
            .unwrap();

        assert_eq!(snapshot.subjects.get("a-value"), Some(&vec![1, 2]));
        assert_eq!(snapshot.subjects.get("b-value"), Some(&vec![1]));
    }

    #[tokio::test]
    async fn filter_excludes_subjects_before_fan_out() {
        let mut client = MockClient::new();

        client
            .expect_list_subjects()
            .returning(|_| Ok(vec!["a-value".to_string(), "b-value".to_string()]));
        client
            .expect_list_versions()
            .times(1)
            .withf(|s, _| s == "a-value")
            .returning(|_, _| Ok(vec![1]));

        let client = Arc::new(client);
        let filter = SubjectFilter::allow(["a-value".to_string()]);
        let snapshot = materialize(&client, &filter, false).await.unwrap();

        assert_eq!(snapshot.subjects.len(), 1);
        assert!(snapshot.subjects.contains_key("a-value"));
    }

    #[tokio::test]
    async fn a_single_subject_failure_does_not_fail_the_whole_materialization() {
        let mut client = MockClient::new();

        client
            .expect_list_subjects()
            .returning(|_| Ok(vec!["a-value".to_string(), "b-value".to_string()]));
        client.expect_list_versions().withf(|s, _| s == "a-value").returning(|_, _| Ok(vec![1]));
        client
            .expect_list_versions()
            .withf(|s, _| s == "b-value")
            .returning(|_, _| Err(crate::error::RegistryError::Http {
                method: "GET",
                url: "http://x/subjects/b-value/versions".to_string(),
                status: 500,
                body: String::new(),
            }));

        let client = Arc::new(client);
        let snapshot = materialize(&client, &SubjectFilter::Unrestricted, false)
            .await
            .unwrap();

        assert_eq!(snapshot.subjects.len(), 1);
        assert!(snapshot.subjects.contains_key("a-value"));
    }
}
