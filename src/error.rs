use std::io;

use thiserror::Error as ThisError;

use reqwest::header::{InvalidHeaderName, InvalidHeaderValue};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, ThisError)]
pub enum ConfigurationError {
    #[error("Error parsing header name: {source}")]
    InvalidHeaderName {
        #[from]
        source: InvalidHeaderName,
    },

    #[error("Error parsing header value: {source}")]
    InvalidHeaderValue {
        #[from]
        source: InvalidHeaderValue,
    },

    #[error("Error applying authentication header: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("Error building HTTP client: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
}

/// Errors raised talking to a single registry endpoint.
#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Error parsing registry response '{body}' into '{target}': {source}")]
    JsonParse {
        body: String,
        target: &'static str,
        source: BoxError,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Http {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Transport error calling the registry: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    #[error("Invalid schema type: {message}")]
    InvalidSchemaType { message: String },

    #[error("Invalid compatibility level: {message}")]
    InvalidCompatibilityLevel { message: String },
}

impl RegistryError {
    pub fn invalid_schema_type<T: ToString>(s: T) -> Self {
        RegistryError::InvalidSchemaType {
            message: s.to_string(),
        }
    }
}

/// Errors raised resolving references and loading schemas from disk.
#[derive(Debug, ThisError)]
pub enum ResolverError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("I/O error reading schema directory: {0}")]
    Io(#[from] io::Error),

    #[error("Error parsing schema file as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Reference to unknown schema descriptor '{descriptor}'")]
    MissingReference { descriptor: String },

    #[error("Cycle detected registering {subject} version {version}")]
    Cycle { subject: String, version: u32 },

    #[error("Schema type '{kind}' is not supported by the loader")]
    UnsupportedSchemaType { kind: String },

    #[error("Could not parse local file name '{name}'")]
    MalformedFileName { name: String },
}

/// Top-level error surface returned by the replication engine.
#[derive(Debug, ThisError)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("Custom plug-in error: {source}")]
    Plugin { source: anyhow::Error },

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Destination schema registry is not reachable")]
    DestinationUnreachable,
}

/// Errors assembling a `ReplicationConfig` from CLI flags, environment, and defaults.
#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("Failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),

    #[error("Exactly one of --sync, --batch-export, --get-local-copy, --from-local-copy, or --delete-all-from-destination must be specified")]
    NoModeSelected,

    #[error("--allow-list and --disallow-list are mutually exclusive")]
    ConflictingFilters,

    #[error("Missing required setting '{0}' for the selected mode")]
    MissingSetting(&'static str),

    #[error("Could not read subject list file '{path}': {source}")]
    SubjectListFile { path: String, source: io::Error },
}
