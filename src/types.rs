use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct Id {
    pub id: u32,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct ResourceMode {
    pub mode: Mode,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    #[serde(rename = "READWRITE")]
    ReadWrite,
    #[serde(rename = "READONLY")]
    ReadOnly,
    #[serde(rename = "IMPORT")]
    Import,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct ClusterConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility_level: Option<CompatibilityLevel>,
}

#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    #[default]
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
    None,
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatibilityLevel::Backward => write!(f, "BACKWARD"),
            CompatibilityLevel::BackwardTransitive => write!(f, "BACKWARD_TRANSITIVE"),
            CompatibilityLevel::Forward => write!(f, "FORWARD"),
            CompatibilityLevel::ForwardTransitive => write!(f, "FORWARD_TRANSITIVE"),
            CompatibilityLevel::Full => write!(f, "FULL"),
            CompatibilityLevel::FullTransitive => write!(f, "FULL_TRANSITIVE"),
            CompatibilityLevel::None => write!(f, "NONE"),
        }
    }
}

impl FromStr for CompatibilityLevel {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("BACKWARD") => Ok(Self::Backward),
            s if s.eq_ignore_ascii_case("BACKWARD_TRANSITIVE") => Ok(Self::BackwardTransitive),
            s if s.eq_ignore_ascii_case("FORWARD") => Ok(Self::Forward),
            s if s.eq_ignore_ascii_case("FORWARD_TRANSITIVE") => Ok(Self::ForwardTransitive),
            s if s.eq_ignore_ascii_case("FULL") => Ok(Self::Full),
            s if s.eq_ignore_ascii_case("FULL_TRANSITIVE") => Ok(Self::FullTransitive),
            s if s.eq_ignore_ascii_case("NONE") => Ok(Self::None),
            _ => Err(RegistryError::InvalidCompatibilityLevel {
                message: s.to_string(),
            }),
        }
    }
}

#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    #[default]
    Avro,
    Protobuf,
    Json,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Avro => write!(f, "AVRO"),
            SchemaType::Protobuf => write!(f, "PROTOBUF"),
            SchemaType::Json => write!(f, "JSON"),
        }
    }
}

impl FromStr for SchemaType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.is_empty() => Ok(SchemaType::Avro),
            s if s.eq_ignore_ascii_case("AVRO") => Ok(SchemaType::Avro),
            s if s.eq_ignore_ascii_case("PROTOBUF") => Ok(SchemaType::Protobuf),
            s if s.eq_ignore_ascii_case("JSON") => Ok(SchemaType::Json),
            _ => Err(RegistryError::invalid_schema_type(s)),
        }
    }
}

/// A named pointer from one schema to a specific `(subject, version)` that must exist
/// when the referring schema is registered.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub name: String,
    pub subject: String,
    pub version: u32,
}

impl Reference {
    pub fn new(name: &str, subject: &str, version: u32) -> Self {
        Self {
            name: name.to_string(),
            subject: subject.to_string(),
            version,
        }
    }
}

/// Body sent when registering a schema. When `id`/`version` are set the registration
/// is import-mode and the registry is expected to preserve them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisteredSchema {
    pub schema: String,
    pub schema_type: SchemaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl UnregisteredSchema {
    pub fn new<T: Into<String>>(schema: T, schema_type: SchemaType) -> Self {
        Self {
            schema: schema.into(),
            schema_type,
            references: None,
            id: None,
            version: None,
        }
    }

    pub fn references<I>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = Reference>,
    {
        let references: Vec<_> = references.into_iter().collect();
        self.references = if references.is_empty() {
            None
        } else {
            Some(references)
        };
        self
    }

    pub fn preserving(mut self, id: u32, version: u32) -> Self {
        self.id = Some(id);
        self.version = Some(version);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RegisteredSchema {
    pub id: u32,
}

/// The outcome of a `register` call: whether it was a fresh write or the registry
/// already held an identical schema under the subject.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RegisterOutcome {
    Registered { id: u32 },
    AlreadyPresent { id: u32 },
}

impl RegisterOutcome {
    pub fn id(&self) -> u32 {
        match self {
            RegisterOutcome::Registered { id } => *id,
            RegisterOutcome::AlreadyPresent { id } => *id,
        }
    }
}

/// The outcome of a `softDelete` call.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    BlockedByReferrers,
}

/// A unit of replication: one `(subject, version)` and its payload.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRecord {
    pub id: u32,
    pub subject: String,
    pub version: u32,
    #[serde(default)]
    pub schema_type: SchemaType,
    pub schema: Cow<'static, str>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl SchemaRecord {
    pub fn to_unregistered(&self) -> UnregisteredSchema {
        UnregisteredSchema::new(self.schema.to_string(), self.schema_type)
            .references(self.references.clone())
            .preserving(self.id, self.version)
    }
}

/// `(subject, version)` pair, as returned by `/schemas/ids/{id}/versions`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubjectVersion {
    pub subject: String,
    pub version: u32,
}

/// `{subject -> [version]}`, the unit the diff engine and materializer both operate on.
pub type VersionMap = HashMap<String, Vec<u32>>;

/// `{id -> {subject -> [version]}}`, the soft-deleted view of a registry.
pub type IdMap = HashMap<u32, VersionMap>;

/// A materialized, point-in-time view of one registry's subjects and versions.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Snapshot {
    pub subjects: VersionMap,
}

impl Snapshot {
    pub fn new(subjects: VersionMap) -> Self {
        Self { subjects }
    }
}
