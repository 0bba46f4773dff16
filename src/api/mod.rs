//! API traits for interacting with a Confluent-compatible schema registry.
//!
//! Split by resource, the way the registry itself groups its endpoints; composed into
//! a single `RegistryClient` supertrait that the replication engine depends on.

pub mod compatibility;
pub mod mode;
pub mod schema;
pub mod subject;

use compatibility::CompatibilityAPI;
use mode::ModeAPI;
use schema::SchemaAPI;
use subject::SubjectAPI;

pub trait RegistryClient: SubjectAPI + ModeAPI + CompatibilityAPI + SchemaAPI {}

impl<T> RegistryClient for T where T: SubjectAPI + ModeAPI + CompatibilityAPI + SchemaAPI {}
