//! The shard manifest: construction and schema validation (spec §3, §4.8
//! stage 2).
//!
//! The manifest is built as an ordered `BTreeMap<String, Value>` (never a
//! `HashMap`) so that its JSON shape cannot accidentally depend on
//! hash-iteration order before canonical encoding sorts keys anyway — this
//! matters because the manifest is also inspected directly by tests and
//! tooling before it is canonicalized.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::errors::AxmResult;
use crate::layout::is_hex_64;
use crate::verify_error::{ErrorCode, VerifyFinding};

pub const SPEC_VERSION: &str = "1.0";

/// The publisher identity recorded in the manifest.
#[derive(Debug, Clone)]
pub struct Publisher {
    pub id: String,
    pub name: String,
}

/// One source file entry: its shard-relative path and content hash.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub path: String,
    pub hash: String,
}

/// Everything the compiler knows once the tables and content are written,
/// needed to build the manifest mapping.
#[derive(Debug, Clone)]
pub struct ManifestInput {
    pub namespace: String,
    pub publisher: Publisher,
    pub license: String,
    pub sources: Vec<SourceEntry>,
    pub merkle_root: String,
    pub entity_count: usize,
    pub claim_count: usize,
    pub created_at: String,
}

/// `shard_id` is derived from the Merkle root (spec §3).
pub fn shard_id(merkle_root: &str) -> String {
    format!("shard_blake3_{merkle_root}")
}

/// Build the manifest mapping (spec §3). The result must be passed through
/// [`crate::canonical_json::to_canonical_bytes`] before being written or
/// signed; this function only assembles the `Value`.
pub fn build_manifest(input: &ManifestInput) -> AxmResult<Value> {
    let mut metadata = Map::new();
    metadata.insert("namespace".to_string(), Value::String(input.namespace.clone()));
    metadata.insert("created_at".to_string(), Value::String(input.created_at.clone()));

    let mut publisher = Map::new();
    publisher.insert("id".to_string(), Value::String(input.publisher.id.clone()));
    publisher.insert("name".to_string(), Value::String(input.publisher.name.clone()));

    let sources: Vec<Value> = input
        .sources
        .iter()
        .map(|s| {
            let mut m = Map::new();
            m.insert("path".to_string(), Value::String(s.path.clone()));
            m.insert("hash".to_string(), Value::String(s.hash.clone()));
            Value::Object(m)
        })
        .collect();

    let mut integrity = Map::new();
    integrity.insert("algorithm".to_string(), Value::String("blake3".to_string()));
    integrity.insert("merkle_root".to_string(), Value::String(input.merkle_root.clone()));

    let mut statistics = Map::new();
    statistics.insert("entities".to_string(), Value::from(input.entity_count as u64));
    statistics.insert("claims".to_string(), Value::from(input.claim_count as u64));

    let mut manifest: BTreeMap<String, Value> = BTreeMap::new();
    manifest.insert("spec_version".to_string(), Value::String(SPEC_VERSION.to_string()));
    manifest.insert("shard_id".to_string(), Value::String(shard_id(&input.merkle_root)));
    manifest.insert("metadata".to_string(), Value::Object(metadata));
    manifest.insert("publisher".to_string(), Value::Object(publisher));
    manifest.insert("license".to_string(), Value::String(input.license.clone()));
    manifest.insert("sources".to_string(), Value::Array(sources));
    manifest.insert("integrity".to_string(), Value::Object(integrity));
    manifest.insert("statistics".to_string(), Value::Object(statistics));

    Ok(Value::Object(manifest.into_iter().collect()))
}

/// Validate the manifest's required shape (spec §3, §4.8 stage 2).
/// Returns `true` iff the manifest passed validation; any violation is
/// appended to `errors` as `E_MANIFEST_SCHEMA`.
pub fn validate_manifest_schema(value: &Value, errors: &mut Vec<VerifyFinding>) -> bool {
    let start = errors.len();

    let obj = match value.as_object() {
        Some(o) => o,
        None => {
            errors.push(VerifyFinding::new(ErrorCode::EManifestSchema, "manifest root is not an object"));
            return false;
        }
    };

    require_str(obj, "spec_version", errors);
    require_str(obj, "shard_id", errors);
    require_str(obj, "license", errors);

    match obj.get("metadata").and_then(Value::as_object) {
        Some(m) => {
            require_str(m, "namespace", errors);
            match m.get("created_at").and_then(Value::as_str) {
                Some(s) if OffsetDateTime::parse(s, &Rfc3339).is_ok() => {}
                _ => errors.push(VerifyFinding::new(
                    ErrorCode::EManifestSchema,
                    "metadata.created_at must be an RFC3339 timestamp",
                )),
            }
        }
        None => errors.push(VerifyFinding::new(ErrorCode::EManifestSchema, "metadata must be an object")),
    }

    match obj.get("publisher").and_then(Value::as_object) {
        Some(p) => {
            require_str(p, "id", errors);
            require_str(p, "name", errors);
        }
        None => errors.push(VerifyFinding::new(ErrorCode::EManifestSchema, "publisher must be an object")),
    }

    match obj.get("sources").and_then(Value::as_array) {
        Some(arr) => {
            for (i, entry) in arr.iter().enumerate() {
                match entry.as_object() {
                    Some(e) => {
                        require_str(e, "path", errors);
                        require_str(e, "hash", errors);
                    }
                    None => errors.push(VerifyFinding::new(
                        ErrorCode::EManifestSchema,
                        format!("sources[{i}] must be an object"),
                    )),
                }
            }
        }
        None => errors.push(VerifyFinding::new(ErrorCode::EManifestSchema, "sources must be an array")),
    }

    match obj.get("integrity").and_then(Value::as_object) {
        Some(i) => {
            match i.get("algorithm").and_then(Value::as_str) {
                Some("blake3") => {}
                _ => errors.push(VerifyFinding::new(
                    ErrorCode::EManifestSchema,
                    "integrity.algorithm must be \"blake3\"",
                )),
            }
            match i.get("merkle_root").and_then(Value::as_str) {
                Some(s) if is_hex_64(s) => {}
                _ => errors.push(VerifyFinding::new(
                    ErrorCode::EManifestSchema,
                    "integrity.merkle_root must be a 64-character lowercase hex string",
                )),
            }
        }
        None => errors.push(VerifyFinding::new(ErrorCode::EManifestSchema, "integrity must be an object")),
    }

    match obj.get("statistics").and_then(Value::as_object) {
        Some(s) => {
            require_u64(s, "entities", errors);
            require_u64(s, "claims", errors);
        }
        None => errors.push(VerifyFinding::new(ErrorCode::EManifestSchema, "statistics must be an object")),
    }

    errors.len() == start
}

fn require_str(obj: &Map<String, Value>, key: &str, errors: &mut Vec<VerifyFinding>) {
    match obj.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => {}
        _ => errors.push(VerifyFinding::new(
            ErrorCode::EManifestSchema,
            format!("{key} must be a non-empty string"),
        )),
    }
}

fn require_u64(obj: &Map<String, Value>, key: &str, errors: &mut Vec<VerifyFinding>) {
    match obj.get(key).and_then(Value::as_u64) {
        Some(_) => {}
        None => errors.push(VerifyFinding::new(
            ErrorCode::EManifestSchema,
            format!("{key} must be a non-negative integer"),
        )),
    }
}

/// Extract the Merkle root from a manifest already known to pass
/// [`validate_manifest_schema`].
pub fn merkle_root_of(value: &Value) -> Option<&str> {
    value.get("integrity")?.get("merkle_root")?.as_str()
}
