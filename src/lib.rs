pub mod api;
pub mod cancellation;
pub mod client;
pub mod diff;
pub mod engine;
pub mod error;
pub mod filter;
pub mod loader;
pub mod local;
pub mod materializer;
pub mod percent;
pub mod plugins;
pub mod resolver;
pub mod settings;
pub mod types;

pub mod prelude {
    pub use crate::api::compatibility::CompatibilityAPI;
    pub use crate::api::mode::ModeAPI;
    pub use crate::api::schema::SchemaAPI;
    pub use crate::api::subject::SubjectAPI;
    pub use crate::api::RegistryClient;
    pub use crate::client::config::SchemaRegistryConfig;
    pub use crate::client::SchemaRegistryClient;
    pub use crate::engine::ReplicationEngine;
    pub use crate::error::{ConfigError, EngineError, RegistryError, ResolverError};
    pub use crate::settings::ReplicationConfig;
    pub use crate::types::{
        CompatibilityLevel, DeleteOutcome, Mode, Reference, RegisterOutcome, SchemaRecord,
        SchemaType, Snapshot, SubjectVersion, UnregisteredSchema,
    };
}

pub use prelude::*;
