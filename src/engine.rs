//! Orchestrates the registry client, materializer, diff engine, and resolver into the
//! tool's four top-level operations, plus the plug-in and utility-mode variants.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;

use crate::api::RegistryClient;
use crate::cancellation::CancellationFlag;
use crate::diff::{id_diff, subject_diff};
use crate::error::EngineError;
use crate::filter::SubjectFilter;
use crate::local;
use crate::materializer::{materialize, materialize_soft_deleted};
use crate::plugins::{CustomDestination, CustomSource, PluginSchema};
use crate::resolver::{cascade_soft_delete, register_with_references};
use crate::types::{CompatibilityLevel, DeleteOutcome, Mode, VersionMap};

/// Threads the allow/deny filter, delete-sync flags, and scrape interval through every
/// top-level operation. Built once at startup and never mutated (per the "no
/// process-global configuration" design note).
#[derive(Debug, Clone)]
pub struct ReplicationEngine {
    filter: SubjectFilter,
    sync_deletes: bool,
    sync_hard_deletes: bool,
    scrape_interval: Duration,
    cancellation: CancellationFlag,
}

impl ReplicationEngine {
    pub fn new(
        filter: SubjectFilter,
        sync_deletes: bool,
        sync_hard_deletes: bool,
        scrape_interval: Duration,
        cancellation: CancellationFlag,
    ) -> Self {
        Self {
            filter,
            sync_deletes,
            sync_hard_deletes,
            scrape_interval,
            cancellation,
        }
    }

    /// Readies `dst` for id-and-version-preserving registration: confirms it's
    /// reachable, then brings it into `Mode::Import` and `CompatibilityLevel::None` if
    /// it isn't already there. `confirm` is asked before either flip unless
    /// `no_prompt` is set; a decline returns `Ok(false)` so the caller can exit
    /// cleanly instead of registering against a destination that will reject it.
    pub async fn prepare_destination<D>(&self, dst: &D, no_prompt: bool, confirm: impl Fn(&str) -> bool) -> Result<bool, EngineError>
    where
        D: RegistryClient + ?Sized,
    {
        if !dst.reachable().await {
            return Err(EngineError::DestinationUnreachable);
        }

        if !dst.is_import_mode().await? {
            let proceed = no_prompt
                || confirm("Destination is not in IMPORT mode; id-and-version-preserving registration needs it. Switch destination to IMPORT mode? [y/N] ");
            if !proceed {
                tracing::info!("user declined to switch destination into IMPORT mode, exiting");
                return Ok(false);
            }
            dst.set_mode(Mode::Import).await?;
        }

        if !dst.is_none_compat().await? {
            let proceed = no_prompt
                || confirm("Destination global compatibility is not NONE; preserving registration may be rejected. Switch destination compatibility to NONE? [y/N] ");
            if !proceed {
                tracing::info!("user declined to relax destination compatibility to NONE, exiting");
                return Ok(false);
            }
            dst.set_global_compatibility(CompatibilityLevel::None).await?;
        }

        Ok(true)
    }

    /// One-shot export of every subject/version at `src` into `dst`, id-and-version
    /// preserving. Resets `dst`'s mode to `ReadWrite` once finished.
    pub async fn batch_export<S, D>(&self, src: &Arc<S>, dst: &Arc<D>) -> Result<(), EngineError>
    where
        S: RegistryClient + 'static,
        D: RegistryClient + 'static,
    {
        if self.sync_deletes {
            self.seed_soft_deletes(src, dst).await?;
        }

        let snapshot = materialize(src, &self.filter, false).await?;
        let submitted = DashSet::new();

        for (subject, versions) in &snapshot.subjects {
            self.register_versions(src, dst, subject, versions, &submitted).await;
        }

        dst.set_mode(Mode::ReadWrite).await?;
        Ok(())
    }

    /// Continuous replication: an infinite tick loop until the cancellation flag fires.
    pub async fn sync<S, D>(&self, src: &Arc<S>, dst: &Arc<D>) -> Result<(), EngineError>
    where
        S: RegistryClient + 'static,
        D: RegistryClient + 'static,
    {
        if self.sync_deletes {
            self.seed_soft_deletes(src, dst).await?;
        }

        let mut tick_number = 0u64;

        loop {
            if self.cancellation.is_cancelled() {
                return Ok(());
            }

            let tick_span = tracing::info_span!("tick", mode = "sync", tick_number);
            let _guard = tick_span.enter();

            let (src_snapshot, dst_snapshot) =
                tokio::try_join!(materialize(src, &self.filter, false), materialize(dst, &self.filter, false))?;

            if src_snapshot != dst_snapshot {
                let missing = subject_diff(&src_snapshot.subjects, &dst_snapshot.subjects);
                let submitted = DashSet::new();
                for (subject, versions) in &missing {
                    self.register_versions(src, dst, subject, versions, &submitted).await;
                }

                if self.sync_deletes {
                    let surplus = subject_diff(&dst_snapshot.subjects, &src_snapshot.subjects);
                    for (subject, versions) in &surplus {
                        for &version in versions {
                            self.soft_delete_one(dst, subject, version).await;
                        }
                    }
                }
            }

            if self.sync_hard_deletes {
                let (src_deleted, dst_deleted) = tokio::try_join!(
                    materialize_soft_deleted(src.as_ref()),
                    materialize_soft_deleted(dst.as_ref())
                )?;
                let surplus = id_diff(&dst_deleted, &src_deleted);
                for subjects in surplus.values() {
                    for (subject, versions) in subjects {
                        for &version in versions {
                            self.hard_delete_one(dst, subject, version).await;
                        }
                    }
                }
            }

            if self.cancellation.is_cancelled() {
                return Ok(());
            }

            tokio::time::sleep(self.scrape_interval).await;
            tick_number += 1;
        }
    }

    /// Writes every `(subject, version)` at `src` to its own file under `path`.
    pub async fn local_export<S>(&self, src: &Arc<S>, path: &Path) -> Result<(), EngineError>
    where
        S: RegistryClient + 'static,
    {
        let snapshot = materialize(src, &self.filter, false).await?;
        local::local_export(src, path, &snapshot).await?;
        Ok(())
    }

    /// Registers every file under `path` at `dst`, reference-ordered.
    pub async fn local_import<D>(&self, dst: &D, path: &Path) -> Result<(), EngineError>
    where
        D: RegistryClient + ?Sized,
    {
        local::local_import(dst, path).await?;
        Ok(())
    }

    /// Permanently removes every subject at `dst`. Destructive; callers are expected to
    /// have already gated this behind `--no-prompt` or an interactive confirmation.
    pub async fn delete_all_from_destination<D>(&self, dst: &D) -> Result<(), EngineError>
    where
        D: RegistryClient + ?Sized,
    {
        let subjects = dst.list_subjects(false).await?;
        for subject in subjects {
            match dst.delete_subject(&subject, false).await {
                Ok(_) => {
                    if let Err(error) = dst.delete_subject(&subject, true).await {
                        tracing::warn!(%subject, %error, "failed to permanently remove subject");
                    }
                }
                Err(error) => {
                    tracing::warn!(%subject, %error, "failed to soft-delete subject during delete-all");
                }
            }
        }
        Ok(())
    }

    /// Continuous replication from a `CustomSource` into a native destination.
    pub async fn custom_source_sync<D>(
        &self,
        custom_src: &mut dyn CustomSource,
        dst: &Arc<D>,
    ) -> Result<(), EngineError>
    where
        D: RegistryClient + 'static,
    {
        custom_src.set_up().await.map_err(|source| EngineError::Plugin { source })?;

        loop {
            if self.cancellation.is_cancelled() {
                break;
            }

            let src_state = custom_src.get_source_state().await.map_err(|source| EngineError::Plugin { source })?;
            let dst_snapshot = materialize(dst, &self.filter, false).await?;

            if src_state != dst_snapshot.subjects {
                let missing = subject_diff(&src_state, &dst_snapshot.subjects);
                self.replay_custom_source(custom_src, dst, &missing).await;

                if self.sync_deletes {
                    let surplus = subject_diff(&dst_snapshot.subjects, &src_state);
                    for (subject, versions) in &surplus {
                        for &version in versions {
                            self.soft_delete_one(dst, subject, version).await;
                            self.hard_delete_one(dst, subject, version).await;
                        }
                    }
                }
            }

            if self.cancellation.is_cancelled() {
                break;
            }

            tokio::time::sleep(self.scrape_interval).await;
        }

        custom_src.tear_down().await.map_err(|source| EngineError::Plugin { source })?;
        Ok(())
    }

    /// Continuous replication from a native source into a `CustomDestination`.
    pub async fn custom_destination_sync<S>(
        &self,
        src: &Arc<S>,
        custom_dst: &mut dyn CustomDestination,
    ) -> Result<(), EngineError>
    where
        S: RegistryClient + 'static,
    {
        custom_dst.set_up().await.map_err(|source| EngineError::Plugin { source })?;

        loop {
            if self.cancellation.is_cancelled() {
                break;
            }

            let src_snapshot = materialize(src, &self.filter, false).await?;
            let dst_state = custom_dst
                .get_destination_state()
                .await
                .map_err(|source| EngineError::Plugin { source })?;

            if src_snapshot.subjects != dst_state {
                let missing = subject_diff(&src_snapshot.subjects, &dst_state);
                for (subject, versions) in &missing {
                    for &version in versions {
                        match src.get_schema(subject, version, false).await {
                            Ok(record) => {
                                let plugin_schema = PluginSchema {
                                    subject: record.subject.clone(),
                                    version: record.version,
                                    id: record.id,
                                    schema_type: record.schema_type,
                                    schema: record.schema.to_string(),
                                    references: record.references.clone(),
                                };
                                if let Err(error) = custom_dst.register_schema(&plugin_schema).await {
                                    tracing::warn!(%subject, version, %error, "custom destination rejected schema");
                                }
                            }
                            Err(error) => {
                                tracing::warn!(%subject, version, %error, "failed to fetch schema for custom destination sync");
                            }
                        }
                    }
                }

                if self.sync_deletes {
                    let surplus = subject_diff(&dst_state, &src_snapshot.subjects);
                    for (subject, versions) in &surplus {
                        for &version in versions {
                            let plugin_schema = PluginSchema {
                                subject: subject.clone(),
                                version,
                                id: 0,
                                schema_type: crate::types::SchemaType::Avro,
                                schema: String::new(),
                                references: Vec::new(),
                            };
                            if let Err(error) = custom_dst.delete_schema(&plugin_schema).await {
                                tracing::warn!(%subject, version, %error, "custom destination rejected delete");
                            }
                        }
                    }
                }
            }

            if self.cancellation.is_cancelled() {
                break;
            }

            tokio::time::sleep(self.scrape_interval).await;
        }

        custom_dst.tear_down().await.map_err(|source| EngineError::Plugin { source })?;
        Ok(())
    }

    async fn replay_custom_source<D>(&self, custom_src: &dyn CustomSource, dst: &Arc<D>, missing: &VersionMap)
    where
        D: RegistryClient + 'static,
    {
        for versions in missing.values() {
            for &schema_source_id in versions {
                match custom_src.get_schema(schema_source_id).await {
                    Ok(schema) => {
                        if !self.filter.allows(&schema.subject) {
                            continue;
                        }
                        let unregistered = crate::types::UnregisteredSchema::new(schema.schema, schema.schema_type)
                            .preserving(schema.id, schema.version);
                        if let Err(error) = dst.register(&schema.subject, &unregistered).await {
                            tracing::warn!(subject = %schema.subject, %error, "failed to register schema from custom source");
                        }
                    }
                    Err(error) => {
                        tracing::warn!(schema_source_id, %error, "failed to fetch schema from custom source");
                    }
                }
            }
        }
    }

    async fn seed_soft_deletes<S, D>(&self, src: &Arc<S>, dst: &Arc<D>) -> Result<(), EngineError>
    where
        S: RegistryClient + 'static,
        D: RegistryClient + 'static,
    {
        let (src_deleted, dst_deleted) = tokio::try_join!(
            materialize_soft_deleted(src.as_ref()),
            materialize_soft_deleted(dst.as_ref())
        )?;

        let missing = id_diff(&src_deleted, &dst_deleted);

        for subjects in missing.values() {
            for (subject, versions) in subjects {
                for &version in versions {
                    let record = match src.get_schema(subject, version, true).await {
                        Ok(record) => record,
                        Err(error) => {
                            tracing::warn!(%subject, version, %error, "failed to fetch soft-deleted record for seeding");
                            continue;
                        }
                    };

                    let unregistered = record.to_unregistered();
                    if let Err(error) = dst.register(subject, &unregistered).await {
                        tracing::warn!(%subject, version, %error, "failed to seed soft-deleted record");
                        continue;
                    }

                    if let Err(error) = dst.soft_delete(subject, version).await {
                        tracing::warn!(%subject, version, %error, "failed to re-apply soft delete while seeding");
                    }
                }
            }
        }

        Ok(())
    }

    async fn register_versions<S, D>(
        &self,
        src: &Arc<S>,
        dst: &Arc<D>,
        subject: &str,
        versions: &[u32],
        submitted: &DashSet<(String, u32)>,
    ) where
        S: RegistryClient + 'static,
        D: RegistryClient + 'static,
    {
        for &version in versions {
            if self.cancellation.is_cancelled() {
                return;
            }

            let record = match src.get_schema(subject, version, false).await {
                Ok(record) => record,
                Err(error) => {
                    tracing::warn!(%subject, version, %error, "failed to fetch source record, skipping for this tick");
                    continue;
                }
            };

            if let Err(error) = register_with_references(src.as_ref(), dst.as_ref(), &record, submitted).await {
                tracing::warn!(%subject, version, %error, "failed to register schema, skipping for this tick");
            }
        }
    }

    async fn soft_delete_one<D>(&self, dst: &Arc<D>, subject: &str, version: u32)
    where
        D: RegistryClient + 'static,
    {
        match cascade_soft_delete(dst.as_ref(), subject, version).await {
            Ok(DeleteOutcome::Deleted) | Ok(DeleteOutcome::NotFound) => {}
            Ok(DeleteOutcome::BlockedByReferrers) => {
                tracing::warn!(%subject, version, "soft delete still blocked by referrers after cascade, retrying next tick");
            }
            Err(error) => {
                tracing::warn!(%subject, version, %error, "failed to soft-delete surplus subject");
            }
        }
    }

    async fn hard_delete_one<D>(&self, dst: &Arc<D>, subject: &str, version: u32)
    where
        D: RegistryClient + 'static,
    {
        if let Err(error) = dst.hard_delete(subject, version).await {
            tracing::warn!(%subject, version, %error, "failed to hard-delete surplus subject");
        }
    }
}
