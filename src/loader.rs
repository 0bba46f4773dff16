//! Loads AVRO schema files from a directory and registers them reference-ordered.
//!
//! Only AVRO is implemented. The loader walks the directory once, groups files into
//! `SchemaDescriptor`s by `(namespace, name)`, and orders each descriptor's multiple
//! versions by file-encounter order.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use walkdir::WalkDir;

use crate::api::RegistryClient;
use crate::error::ResolverError;
use crate::types::{Reference, SchemaType, UnregisteredSchema};

const NATIVE_TYPES: &[&str] = &[
    "null",
    "boolean",
    "int",
    "long",
    "float",
    "double",
    "bytes",
    "string",
    "record",
    "enum",
    "array",
    "map",
    "fixed",
    "decimal",
    "uuid",
    "date",
    "time-millis",
    "time-micros",
    "timestamp-millis",
    "timestamp-micros",
    "local-timestamp-millis",
    "local-timestamp-micros",
    "duration",
];

fn is_native_type(name: &str) -> bool {
    NATIVE_TYPES.contains(&name)
}

/// `(namespace, name)`, identifying one AVRO record across all its registered versions.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SchemaDescriptor {
    pub namespace: String,
    pub name: String,
}

impl SchemaDescriptor {
    fn qualified(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    fn subject(&self) -> String {
        format!("{}-value", self.qualified())
    }
}

#[derive(Debug, Clone)]
struct LoadedVersion {
    raw: Value,
    text: String,
}

/// The full set of descriptors discovered under a directory, each holding its versions
/// in file-encounter order (version 0 first).
pub struct LoadedSchemas {
    descriptors: HashMap<SchemaDescriptor, Vec<LoadedVersion>>,
    by_qualified: HashMap<String, SchemaDescriptor>,
}

/// Walks `dir` once, parsing every regular file as JSON and indexing it by its AVRO
/// `(namespace, name)`. Files with the same descriptor become successive versions in
/// the order they're encountered while walking.
pub fn walk(dir: &Path, schema_type: SchemaType) -> Result<LoadedSchemas, ResolverError> {
    if schema_type != SchemaType::Avro {
        return Err(ResolverError::UnsupportedSchemaType {
            kind: schema_type.to_string(),
        });
    }

    let mut descriptors: HashMap<SchemaDescriptor, Vec<LoadedVersion>> = HashMap::new();
    let mut by_qualified = HashMap::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }

        let text = std::fs::read_to_string(entry.path())?;
        let raw: Value = serde_json::from_str(&text)?;

        let namespace = raw.get("namespace").and_then(Value::as_str).unwrap_or("");
        let name = match raw.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => continue,
        };

        let descriptor = SchemaDescriptor {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };

        by_qualified.insert(descriptor.qualified(), descriptor.clone());
        descriptors.entry(descriptor).or_default().push(LoadedVersion { raw, text });
    }

    Ok(LoadedSchemas {
        descriptors,
        by_qualified,
    })
}

/// Extracts the set of other descriptors a single AVRO record type references, by
/// scanning its `fields` array. Unions are flattened; `map.values` and `array.items`
/// are followed one level.
fn referenced_descriptors(record: &Value) -> Vec<String> {
    let mut found = Vec::new();

    let fields = match record.get("fields").and_then(Value::as_array) {
        Some(fields) => fields,
        None => return found,
    };

    for field in fields {
        let Some(field_type) = field.get("type") else {
            continue;
        };
        collect_non_native(field_type, &mut found);
    }

    found
}

fn collect_non_native(type_value: &Value, found: &mut Vec<String>) {
    match type_value {
        Value::String(name) => {
            if !is_native_type(name) {
                found.push(name.clone());
            }
        }
        Value::Array(union_members) => {
            for member in union_members {
                collect_non_native(member, found);
            }
        }
        Value::Object(obj) => {
            if let Some(Value::String(kind)) = obj.get("type") {
                match kind.as_str() {
                    "map" => {
                        if let Some(values) = obj.get("values") {
                            collect_non_native(values, found);
                        }
                    }
                    "array" => {
                        if let Some(items) = obj.get("items") {
                            collect_non_native(items, found);
                        }
                    }
                    "record" | "enum" | "fixed" => {
                        if let Some(Value::String(name)) = obj.get("name") {
                            if !is_native_type(name) {
                                found.push(name.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

/// Registers every descriptor `walk` found at `client`, reference-ordered, skipping any
/// version already present under its subject.
pub async fn load_and_register<C>(loaded: &LoadedSchemas, client: &C) -> Result<usize, ResolverError>
where
    C: RegistryClient + ?Sized,
{
    let mut submitted: HashMap<SchemaDescriptor, usize> = HashMap::new();
    let mut registered = 0usize;

    let mut descriptors: Vec<&SchemaDescriptor> = loaded.descriptors.keys().collect();
    descriptors.sort();

    for descriptor in descriptors {
        registered += register_descriptor(descriptor, loaded, client, &mut submitted).await?;
    }

    Ok(registered)
}

fn register_descriptor<'a, C>(
    descriptor: &'a SchemaDescriptor,
    loaded: &'a LoadedSchemas,
    client: &'a C,
    submitted: &'a mut HashMap<SchemaDescriptor, usize>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<usize, ResolverError>> + 'a>>
where
    C: RegistryClient + ?Sized,
{
    Box::pin(async move {
        let versions = loaded.descriptors.get(descriptor).ok_or_else(|| ResolverError::MissingReference {
            descriptor: descriptor.qualified(),
        })?;

        let already_submitted = submitted.get(descriptor).copied().unwrap_or(0);
        let mut registered = 0usize;

        for (version, loaded_version) in versions.iter().enumerate().skip(already_submitted) {
            let references = referenced_descriptors(&loaded_version.raw);

            for reference_name in &references {
                let reference_descriptor =
                    loaded
                        .by_qualified
                        .get(reference_name)
                        .ok_or_else(|| ResolverError::MissingReference {
                            descriptor: reference_name.clone(),
                        })?;

                if submitted.get(reference_descriptor).copied().unwrap_or(0)
                    < loaded.descriptors.get(reference_descriptor).map(Vec::len).unwrap_or(0)
                {
                    registered += register_descriptor(reference_descriptor, loaded, client, submitted).await?;
                }
            }

            let subject = descriptor.subject();
            let references: Vec<Reference> = references
                .iter()
                .filter_map(|name| loaded.by_qualified.get(name))
                .map(|reference_descriptor| {
                    let reference_version =
                        loaded.descriptors.get(reference_descriptor).map(Vec::len).unwrap_or(1) as u32;
                    Reference::new(&reference_descriptor.name, &reference_descriptor.subject(), reference_version)
                })
                .collect();

            let unregistered =
                UnregisteredSchema::new(loaded_version.text.clone(), SchemaType::Avro).references(references);

            if !client.schema_exists_under_subject(&subject, &unregistered).await? {
                client.register(&subject, &unregistered).await?;
                registered += 1;
                tracing::info!(%subject, version, "registered schema from local directory");
            }

            submitted.insert(descriptor.clone(), version + 1);
        }

        Ok(registered)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_union_references() {
        let record = serde_json::json!({
            "fields": [
                { "name": "a", "type": ["null", "com.example.Inner"] },
                { "name": "b", "type": "string" }
            ]
        });

        assert_eq!(referenced_descriptors(&record), vec!["com.example.Inner"]);
    }

    #[test]
    fn follows_map_values_and_array_items_one_level() {
        let record = serde_json::json!({
            "fields": [
                { "name": "a", "type": { "type": "map", "values": "com.example.V" } },
                { "name": "b", "type": { "type": "array", "items": "com.example.I" } }
            ]
        });

        let mut found = referenced_descriptors(&record);
        found.sort();
        assert_eq!(found, vec!["com.example.I", "com.example.V"]);
    }

    #[test]
    fn native_types_are_not_references() {
        let record = serde_json::json!({
            "fields": [
                { "name": "a", "type": "string" },
                { "name": "b", "type": "long" }
            ]
        });

        assert!(referenced_descriptors(&record).is_empty());
    }

    #[test]
    fn nested_record_definitions_are_not_treated_as_references() {
        let record = serde_json::json!({
            "fields": [
                { "name": "a", "type": { "type": "record", "name": "com.example.Nested", "fields": [] } }
            ]
        });

        assert_eq!(referenced_descriptors(&record), vec!["com.example.Nested"]);
    }
}
