//! Reference-ordered registration between two live registries, and the delete-cascade
//! policy that unblocks a soft delete on schemas with live referrers.

use std::collections::HashSet;

use dashmap::DashSet;

use crate::api::RegistryClient;
use crate::error::ResolverError;
use crate::types::{DeleteOutcome, RegisterOutcome, SchemaRecord};

/// Registers `record` at `dst`, first recursively registering every schema it
/// references (fetched from `src`). Tracks already-submitted `(subject, version)`
/// pairs in `submitted` so repeated references across a batch are not re-fetched, and
/// detects cycles via `active`, the set of pairs on the current recursion path.
pub async fn register_with_references<S, D>(
    src: &S,
    dst: &D,
    record: &SchemaRecord,
    submitted: &DashSet<(String, u32)>,
) -> Result<RegisterOutcome, ResolverError>
where
    S: RegistryClient + ?Sized,
    D: RegistryClient + ?Sized,
{
    let mut active = HashSet::new();
    register_inner(src, dst, record, submitted, &mut active).await
}

fn register_inner<'a, S, D>(
    src: &'a S,
    dst: &'a D,
    record: &'a SchemaRecord,
    submitted: &'a DashSet<(String, u32)>,
    active: &'a mut HashSet<(String, u32)>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<RegisterOutcome, ResolverError>> + 'a>>
where
    S: RegistryClient + ?Sized,
    D: RegistryClient + ?Sized,
{
    Box::pin(async move {
        let key = (record.subject.clone(), record.version);

        if !active.insert(key.clone()) {
            return Err(ResolverError::Cycle {
                subject: record.subject.clone(),
                version: record.version,
            });
        }

        for reference in &record.references {
            let reference_key = (reference.subject.clone(), reference.version);
            if submitted.contains(&reference_key) {
                continue;
            }

            let referenced_record = src.get_schema(&reference.subject, reference.version, false).await?;
            register_inner(src, dst, &referenced_record, submitted, active).await?;
        }

        active.remove(&key);

        if submitted.contains(&key) {
            return Ok(RegisterOutcome::AlreadyPresent { id: record.id });
        }

        let unregistered = record.to_unregistered();
        let outcome = dst.register(&record.subject, &unregistered).await?;

        match outcome {
            RegisterOutcome::Registered { .. } => {
                tracing::info!(subject = %record.subject, version = record.version, "registered schema reference-ordered");
            }
            RegisterOutcome::AlreadyPresent { .. } => {}
        }

        submitted.insert(key);
        Ok(outcome)
    })
}

/// Soft-deletes `(subject, version)` at `dst`, cascading to every live referrer first
/// if the registry reports the delete is blocked, then retrying the original delete
/// exactly once.
pub async fn cascade_soft_delete<D>(dst: &D, subject: &str, version: u32) -> Result<DeleteOutcome, ResolverError>
where
    D: RegistryClient + ?Sized,
{
    let outcome = dst.soft_delete(subject, version).await?;

    if outcome != DeleteOutcome::BlockedByReferrers {
        return Ok(outcome);
    }

    let referrer_ids = dst.referenced_by(subject, version).await?;

    for id in referrer_ids {
        for subject_version in dst.subject_versions_for_id(id).await? {
            delete_referrer(dst, &subject_version.subject, subject_version.version).await?;
        }
    }

    dst.soft_delete(subject, version).await.map_err(Into::into)
}

fn delete_referrer<'a, D>(
    dst: &'a D,
    subject: &'a str,
    version: u32,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ResolverError>> + 'a>>
where
    D: RegistryClient + ?Sized,
{
    Box::pin(async move {
        let outcome = cascade_soft_delete(dst, subject, version).await?;
        if outcome == DeleteOutcome::Deleted {
            dst.hard_delete(subject, version).await?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;

    use crate::types::{Reference, SchemaType};

    mock! {
        pub Client {}

        #[async_trait]
        impl crate::api::subject::SubjectAPI for Client {
            async fn list_subjects(&self, include_soft_deleted: bool) -> Result<Vec<String>, crate::error::RegistryError>;
            async fn list_versions(&self, subject: &str, include_soft_deleted: bool) -> Result<Vec<u32>, crate::error::RegistryError>;
            async fn get_schema(&self, subject: &str, version: u32, include_soft_deleted: bool) -> Result<SchemaRecord, crate::error::RegistryError>;
            async fn register(&self, subject: &str, schema: &crate::types::UnregisteredSchema) -> Result<RegisterOutcome, crate::error::RegistryError>;
            async fn soft_delete(&self, subject: &str, version: u32) -> Result<DeleteOutcome, crate::error::RegistryError>;
            async fn hard_delete(&self, subject: &str, version: u32) -> Result<DeleteOutcome, crate::error::RegistryError>;
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

    fn record(subject: &str, version: u32, id: u32, references: Vec<Reference>) -> SchemaRecord {
        SchemaRecord {
            id,
            subject: subject.to_string(),
            version,
            schema_type: SchemaType::Avro,
            schema: "{}".to_string().into(),
            references,
        }
    }

    #[tokio::test]
    async fn registers_a_referenced_schema_before_its_dependent() {
        let mut src = MockClient::new();
        let mut dst = MockClient::new();

        src.expect_get_schema()
            .withf(|s, v, _| s == "reference-value" && *v == 1)
            .returning(|_, _, _| Ok(record("reference-value", 1, 12345, vec![])));

        let mut seq = mockall::Sequence::new();
        dst.expect_register()
            .withf(|s, _| s == "reference-value")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(RegisterOutcome::Registered { id: 12345 }));
        dst.expect_register()
            .withf(|s, _| s == "referencing-value")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(RegisterOutcome::Registered { id: 12346 }));

        let dependent = record(
            "referencing-value",
            1,
            12346,
            vec![Reference::new("Reference", "reference-value", 1)],
        );

        let submitted = DashSet::new();
        let outcome = register_with_references(&src, &dst, &dependent, &submitted).await.unwrap();
        assert_eq!(outcome, RegisterOutcome::Registered { id: 12346 });
    }

    #[tokio::test]
    async fn a_self_referencing_chain_is_rejected_as_a_cycle() {
        let src = MockClient::new();
        let dst = MockClient::new();

        let looping = record(
            "a-value",
            1,
            1,
            vec![Reference::new("A", "a-value", 1)],
        );

        let submitted = DashSet::new();
        let result = register_with_references(&src, &dst, &looping, &submitted).await;
        assert!(matches!(result, Err(ResolverError::Cycle { .. })));
    }

    #[tokio::test]
    async fn cascades_a_blocked_delete_to_its_referrer_first() {
        let mut dst = MockClient::new();

        let mut seq = mockall::Sequence::new();
        dst.expect_soft_delete()
            .withf(|s, v| s == "reference-value" && *v == 1)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(DeleteOutcome::BlockedByReferrers));
        dst.expect_referenced_by()
            .withf(|s, v| s == "reference-value" && *v == 1)
            .returning(|_, _| Ok(vec![12346]));
        dst.expect_subject_versions_for_id().withf(|id| *id == 12346).returning(|_| {
            Ok(vec![crate::types::SubjectVersion {
                subject: "referencing-value".to_string(),
                version: 1,
            }])
        });
        dst.expect_soft_delete()
            .withf(|s, v| s == "referencing-value" && *v == 1)
            .times(1)
            .returning(|_, _| Ok(DeleteOutcome::Deleted));
        dst.expect_hard_delete()
            .withf(|s, v| s == "referencing-value" && *v == 1)
            .times(1)
            .returning(|_, _| Ok(DeleteOutcome::Deleted));
        dst.expect_soft_delete()
            .withf(|s, v| s == "reference-value" && *v == 1)
            .times(1)
            .returning(|_, _| Ok(DeleteOutcome::Deleted));

        let outcome = cascade_soft_delete(&dst, "reference-value", 1).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
    }
}
