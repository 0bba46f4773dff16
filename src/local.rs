//! Encodes/decodes the on-disk dump format used by `--get-local-copy` /
//! `--from-local-copy`, and drives the paced export/import walk over a directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use walkdir::WalkDir;

use crate::api::RegistryClient;
use crate::error::ResolverError;
use crate::percent::{escape, unescape};
use crate::types::{Reference, SchemaRecord, SchemaType, UnregisteredSchema};

/// Delay between scheduling consecutive per-subject export/import tasks.
const SCHEDULING_DELAY: Duration = Duration::from_millis(2);

/// The line written between a schema's payload and its serialized references, chosen
/// unlikely to collide with any AVRO/JSON/Protobuf payload content.
const REFERENCES_SEPARATOR: &str = "---registry-sync-references---";

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LocalFileName {
    pub subject: String,
    pub version: u32,
    pub id: u32,
    pub schema_type: SchemaType,
}

impl LocalFileName {
    pub fn new(subject: &str, version: u32, id: u32, schema_type: SchemaType) -> Self {
        Self {
            subject: subject.to_string(),
            version,
            id,
            schema_type,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            escape(&self.subject),
            self.version,
            self.id,
            self.schema_type
        )
    }

    pub fn decode(name: &str) -> Result<Self, ResolverError> {
        let mut parts = name.rsplitn(4, '-');
        let schema_type = parts.next();
        let id = parts.next();
        let version = parts.next();
        let subject = parts.next();

        let (subject, version, id, schema_type) = match (subject, version, id, schema_type) {
            (Some(subject), Some(version), Some(id), Some(schema_type)) => (subject, version, id, schema_type),
            _ => {
                return Err(ResolverError::MalformedFileName {
                    name: name.to_string(),
                })
            }
        };

        let version: u32 = version.parse().map_err(|_| ResolverError::MalformedFileName {
            name: name.to_string(),
        })?;
        let id: u32 = id.parse().map_err(|_| ResolverError::MalformedFileName {
            name: name.to_string(),
        })?;
        let schema_type: SchemaType = schema_type.parse()?;
        let subject = unescape(subject).map_err(|_| ResolverError::MalformedFileName {
            name: name.to_string(),
        })?;

        Ok(Self {
            subject,
            version,
            id,
            schema_type,
        })
    }

    fn prefix(&self) -> String {
        format!("{}-{}", escape(&self.subject), self.version)
    }
}

/// Serializes a schema record's payload and references into the on-disk body format.
pub fn encode_body(record: &SchemaRecord) -> String {
    if record.references.is_empty() {
        return record.schema.to_string();
    }

    let mut body = record.schema.to_string();
    body.push('\n');
    body.push_str(REFERENCES_SEPARATOR);
    body.push('\n');

    for reference in &record.references {
        let line = serde_json::to_string(reference).expect("Reference serializes");
        body.push_str(&line);
        body.push('|');
        body.push('\n');
    }

    body
}

/// Splits a decoded body back into its schema payload and reference list.
pub fn decode_body(body: &str) -> Result<(String, Vec<Reference>), ResolverError> {
    let Some((payload, rest)) = body.split_once(&format!("\n{REFERENCES_SEPARATOR}\n")) else {
        return Ok((body.to_string(), Vec::new()));
    };

    let mut references = Vec::new();
    for line in rest.lines() {
        let line = line.trim_end_matches('|');
        if line.is_empty() {
            continue;
        }
        references.push(serde_json::from_str(line)?);
    }

    Ok((payload.to_string(), references))
}

/// Writes every `(subject, version)` record under `src` to its own file in `dir`,
/// fanning out one task per subject, paced `SCHEDULING_DELAY` apart.
pub async fn local_export<C>(client: &Arc<C>, dir: &Path, snapshot: &crate::types::Snapshot) -> Result<(), ResolverError>
where
    C: RegistryClient + 'static,
{
    std::fs::create_dir_all(dir)?;

    let (tx, mut rx) = tokio::sync::mpsc::channel(256);

    for (subject, versions) in &snapshot.subjects {
        let client = Arc::clone(client);
        let subject = subject.clone();
        let versions = versions.clone();
        let dir = dir.to_path_buf();
        let tx = tx.clone();

        tokio::spawn(async move {
            let result = export_subject(&*client, &dir, &subject, &versions).await;
            let _ = tx.send((subject, result)).await;
        });

        tokio::time::sleep(SCHEDULING_DELAY).await;
    }

    drop(tx);

    while let Some((subject, result)) = rx.recv().await {
        if let Err(error) = result {
            tracing::warn!(%subject, %error, "failed to export subject to local copy, skipping for this run");
        }
    }

    Ok(())
}

async fn export_subject<C>(client: &C, dir: &Path, subject: &str, versions: &[u32]) -> Result<(), ResolverError>
where
    C: RegistryClient + ?Sized,
{
    for &version in versions {
        let record = client.get_schema(subject, version, false).await?;
        let file_name = LocalFileName::new(subject, version, record.id, record.schema_type).encode();
        let body = encode_body(&record);
        std::fs::write(dir.join(file_name), body)?;
    }
    Ok(())
}

/// Walks `dir`, registering every file's schema at `dst`, reference-ordered via
/// sibling lookups keyed by `{urlEscape(subject)}-{version}` filename prefixes.
pub async fn local_import<C>(client: &C, dir: &Path) -> Result<usize, ResolverError>
where
    C: RegistryClient + ?Sized,
{
    let mut by_prefix: HashMap<String, PathBuf> = HashMap::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        let Ok(decoded) = LocalFileName::decode(file_name) else {
            continue;
        };
        by_prefix.insert(decoded.prefix(), entry.path().to_path_buf());
    }

    let mut submitted = std::collections::HashSet::new();
    let mut registered = 0usize;

    for path in by_prefix.values().cloned().collect::<Vec<_>>() {
        registered += import_file(client, &path, &by_prefix, &mut submitted).await?;
    }

    Ok(registered)
}

fn import_file<'a, C>(
    client: &'a C,
    path: &'a Path,
    by_prefix: &'a HashMap<String, PathBuf>,
    submitted: &'a mut std::collections::HashSet<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<usize, ResolverError>> + 'a>>
where
    C: RegistryClient + ?Sized,
{
    Box::pin(async move {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ResolverError::MalformedFileName {
                name: path.display().to_string(),
            })?;
        let decoded = LocalFileName::decode(file_name)?;
        let prefix = decoded.prefix();

        if submitted.contains(&prefix) {
            return Ok(0);
        }

        let body = std::fs::read_to_string(path)?;
        let (payload, references) = decode_body(&body)?;

        let mut registered = 0usize;
        for reference in &references {
            let reference_prefix = format!("{}-{}", escape(&reference.subject), reference.version);
            let reference_path = by_prefix.get(&reference_prefix).ok_or_else(|| ResolverError::MissingReference {
                descriptor: format!("{}@{}", reference.subject, reference.version),
            })?;
            registered += import_file(client, reference_path, by_prefix, submitted).await?;
        }

        let unregistered = UnregisteredSchema::new(payload, decoded.schema_type)
            .references(references)
            .preserving(decoded.id, decoded.version);

        client.register(&decoded.subject, &unregistered).await?;
        registered += 1;
        submitted.insert(prefix);

        Ok(registered)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str, version: u32, id: u32, references: Vec<Reference>) -> SchemaRecord {
        SchemaRecord {
            id,
            subject: subject.to_string(),
            version,
            schema_type: SchemaType::Avro,
            schema: "{\"type\":\"record\"}".to_string().into(),
            references,
        }
    }

    #[test]
    fn file_name_round_trips() {
        let name = LocalFileName::new("someSubject-value", 3, 100500, SchemaType::Avro);
        let encoded = name.encode();
        let decoded = LocalFileName::decode(&encoded).unwrap();
        assert_eq!(decoded, name);
    }

    #[test]
    fn body_without_references_is_the_bare_payload() {
        let record = record("a-value", 1, 1, vec![]);
        let body = encode_body(&record);
        let (payload, references) = decode_body(&body).unwrap();
        assert_eq!(payload, record.schema.to_string());
        assert!(references.is_empty());
    }

    #[test]
    fn body_with_references_round_trips() {
        let references = vec![Reference::new("Inner", "inner-value", 2)];
        let record = record("outer-value", 1, 1, references.clone());
        let body = encode_body(&record);
        let (payload, decoded_references) = decode_body(&body).unwrap();
        assert_eq!(payload, record.schema.to_string());
        assert_eq!(decoded_references, references);
    }
}
