//! A client bound to a single Confluent-compatible schema registry endpoint.

pub mod config;
mod http_util;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};

use crate::api::compatibility::CompatibilityAPI;
use crate::api::mode::ModeAPI;
use crate::api::schema::SchemaAPI;
use crate::api::subject::SubjectAPI;
use crate::error::RegistryError;
use crate::percent::escape;
use crate::types::{
    CompatibilityLevel, DeleteOutcome, IdMap, Mode, RegisterOutcome, RegisteredSchema, ResourceMode,
    SchemaRecord, SubjectVersion, UnregisteredSchema,
};
use config::{build_http_client, SchemaRegistryConfig};
use http_util::{
    error_code, parse_response, REFERENCED_BY_OTHER_SCHEMAS_ERROR_CODE, VND_SCHEMA_REGISTRY_V1_JSON,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompatibilityRead {
    compatibility_level: CompatibilityLevel,
}

#[derive(Debug, Serialize)]
struct CompatibilityWrite {
    compatibility: CompatibilityLevel,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaListEntry {
    subject: String,
    version: u32,
    id: u32,
}

/// A thin wrapper around `reqwest`, bound to one registry endpoint and one set of
/// credentials. Cloning is cheap: the underlying connection pool is shared.
#[derive(Clone)]
pub struct SchemaRegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl SchemaRegistryClient {
    pub fn from_url(url: &str) -> Result<Self, RegistryError> {
        Self::from_conf(SchemaRegistryConfig::new(url))
    }

    pub fn from_conf(conf: SchemaRegistryConfig) -> Result<Self, RegistryError> {
        let base_url = conf.url.trim_end_matches('/').to_string();
        let http = build_http_client(&conf)?;
        Ok(Self { base_url, http })
    }

    fn subject_url(&self, subject: &str) -> String {
        format!("{}/subjects/{}", self.base_url, escape(subject))
    }

    /// Checks whether `schema` is already registered under `subject`, via the registry's
    /// own check-endpoint, returning its id if so.
    async fn lookup(
        &self,
        subject: &str,
        schema: &UnregisteredSchema,
    ) -> Result<Option<u32>, RegistryError> {
        let mut lookup_schema = schema.clone();
        lookup_schema.id = None;
        lookup_schema.version = None;

        let response = self
            .http
            .post(self.subject_url(subject))
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .json(&lookup_schema)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let existing: RegisteredSchema = parse_response("POST", response).await?;
        Ok(Some(existing.id))
    }
}

#[async_trait]
impl SubjectAPI for SchemaRegistryClient {
    async fn list_subjects(&self, include_soft_deleted: bool) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/subjects?deleted={}", self.base_url, include_soft_deleted);

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .send()
            .await?;

        parse_response("GET", response).await
    }

    async fn list_versions(
        &self,
        subject: &str,
        include_soft_deleted: bool,
    ) -> Result<Vec<u32>, RegistryError> {
        let url = format!(
            "{}/versions?deleted={}",
            self.subject_url(subject),
            include_soft_deleted
        );

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .send()
            .await?;

        parse_response("GET", response).await
    }

    async fn get_schema(
        &self,
        subject: &str,
        version: u32,
        include_soft_deleted: bool,
    ) -> Result<SchemaRecord, RegistryError> {
        let url = format!(
            "{}/versions/{}?deleted={}",
            self.subject_url(subject),
            version,
            include_soft_deleted
        );

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .send()
            .await?;

        parse_response("GET", response).await
    }

    async fn register(
        &self,
        subject: &str,
        schema: &UnregisteredSchema,
    ) -> Result<RegisterOutcome, RegistryError> {
        if let Some(id) = self.lookup(subject, schema).await? {
            return Ok(RegisterOutcome::AlreadyPresent { id });
        }

        let url = format!("{}/versions", self.subject_url(subject));

        let response = self
            .http
            .post(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .json(schema)
            .send()
            .await?;

        let registered: RegisteredSchema = parse_response("POST", response).await?;
        Ok(RegisterOutcome::Registered { id: registered.id })
    }

    async fn soft_delete(&self, subject: &str, version: u32) -> Result<DeleteOutcome, RegistryError> {
        let url = format!("{}/versions/{}?permanent=false", self.subject_url(subject), version);
        delete(&self.http, &url).await
    }

    async fn hard_delete(&self, subject: &str, version: u32) -> Result<DeleteOutcome, RegistryError> {
        let url = format!("{}/versions/{}?permanent=true", self.subject_url(subject), version);
        delete(&self.http, &url).await
    }

    async fn delete_subject(&self, subject: &str, permanent: bool) -> Result<Vec<u32>, RegistryError> {
        let url = format!("{}?permanent={}", self.subject_url(subject), permanent);

        let response = self
            .http
            .delete(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .send()
            .await?;

        parse_response("DELETE", response).await
    }

    async fn referenced_by(&self, subject: &str, version: u32) -> Result<Vec<u32>, RegistryError> {
        let url = format!("{}/versions/{}/referencedby", self.subject_url(subject), version);

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .send()
            .await?;

        parse_response("GET", response).await
    }

    async fn subject_versions_for_id(&self, id: u32) -> Result<Vec<SubjectVersion>, RegistryError> {
        let url = format!("{}/schemas/ids/{}/versions", self.base_url, id);

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .send()
            .await?;

        parse_response("GET", response).await
    }

    async fn schema_exists_under_subject(
        &self,
        subject: &str,
        schema: &UnregisteredSchema,
    ) -> Result<bool, RegistryError> {
        Ok(self.lookup(subject, schema).await?.is_some())
    }
}

async fn delete(http: &reqwest::Client, url: &str) -> Result<DeleteOutcome, RegistryError> {
    let response = http
        .delete(url)
        .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        return Ok(DeleteOutcome::Deleted);
    }

    if status == StatusCode::NOT_FOUND {
        return Ok(DeleteOutcome::NotFound);
    }

    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::UNPROCESSABLE_ENTITY
        && error_code(&body) == Some(REFERENCED_BY_OTHER_SCHEMAS_ERROR_CODE)
    {
        return Ok(DeleteOutcome::BlockedByReferrers);
    }

    Err(RegistryError::Http {
        method: "DELETE",
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ModeAPI for SchemaRegistryClient {
    async fn get_mode(&self) -> Result<Mode, RegistryError> {
        let url = format!("{}/mode", self.base_url);

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .send()
            .await?;

        let resource: ResourceMode = parse_response("GET", response).await?;
        Ok(resource.mode)
    }

    async fn set_mode(&self, mode: Mode) -> Result<(), RegistryError> {
        let url = format!("{}/mode", self.base_url);

        let response = self
            .http
            .put(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .json(&ResourceMode { mode })
            .send()
            .await?;

        let _: ResourceMode = parse_response("PUT", response).await?;
        Ok(())
    }

    async fn is_import_mode(&self) -> Result<bool, RegistryError> {
        Ok(self.get_mode().await? == Mode::Import)
    }
}

#[async_trait]
impl CompatibilityAPI for SchemaRegistryClient {
    async fn get_global_compatibility(&self) -> Result<CompatibilityLevel, RegistryError> {
        let url = format!("{}/config", self.base_url);

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .send()
            .await?;

        let config: CompatibilityRead = parse_response("GET", response).await?;
        Ok(config.compatibility_level)
    }

    async fn set_global_compatibility(&self, level: CompatibilityLevel) -> Result<(), RegistryError> {
        let url = format!("{}/config", self.base_url);

        let response = self
            .http
            .put(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .json(&CompatibilityWrite { compatibility: level })
            .send()
            .await?;

        #[derive(Deserialize)]
        struct Ack {
            #[allow(dead_code)]
            compatibility: String,
        }
        let _: Ack = parse_response("PUT", response).await?;

        Ok(())
    }

    async fn is_none_compat(&self) -> Result<bool, RegistryError> {
        Ok(self.get_global_compatibility().await? == CompatibilityLevel::None)
    }
}

#[async_trait]
impl SchemaAPI for SchemaRegistryClient {
    async fn reachable(&self) -> bool {
        matches!(self.http.get(&self.base_url).send().await, Ok(response) if response.status().is_success())
    }

    async fn list_all_schemas(&self, include_soft_deleted: bool) -> Result<IdMap, RegistryError> {
        let url = format!("{}/schemas?deleted={}", self.base_url, include_soft_deleted);

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
            .send()
            .await?;

        let entries: Vec<SchemaListEntry> = parse_response("GET", response).await?;

        let mut map = IdMap::new();
        for entry in entries {
            map.entry(entry.id)
                .or_default()
                .entry(entry.subject)
                .or_insert_with(Vec::new)
                .push(entry.version);
        }

        Ok(map)
    }
}
