//! The shard verifier (spec §4.8): a strictly staged, bounded auditor that
//! re-derives every identifier, recomputes the Merkle root, checks the
//! signature against an externally supplied trusted key, and confirms
//! every recorded byte span decodes to exactly the stored text.
//!
//! Errors accumulate within a stage; the pipeline short-circuits between
//! stages — the next stage only runs if the previous reported none. No
//! stage ever panics or propagates a validation failure as an exception;
//! everything lands in the returned [`VerifyReport`].

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::{CoreConfig, MAX_MANIFEST_BYTES};
use crate::crypto;
use crate::errors::AxmResult;
use crate::identity::{self, VALID_OBJECT_TYPES, VALID_TIERS};
use crate::layout;
use crate::manifest;
use crate::merkle;
use crate::table;
use crate::verify_error::{ErrorCode, VerifyFinding, VerifyReport};

/// Verifier strictness. The spec names a single `strict` mode; the enum
/// exists so a future relaxed mode has somewhere to go without changing
/// the public signature of [`verify_shard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    #[default]
    Strict,
}

/// Run every verification stage in order against `root`, short-circuiting
/// after the first stage that accumulates any finding.
pub fn verify_shard(root: &Path, trusted_key: &[u8], _mode: VerifyMode, cfg: &CoreConfig) -> AxmResult<VerifyReport> {
    let shard_label = root.display().to_string();
    let mut errors: Vec<VerifyFinding> = Vec::new();

    if !stage_layout(root, &mut errors)? {
        return Ok(finish(shard_label, errors));
    }

    let manifest_bytes = match std::fs::read(root.join("manifest.json")) {
        Ok(b) => b,
        Err(e) => {
            errors.push(VerifyFinding::new(ErrorCode::EManifestSyntax, format!("cannot read manifest.json: {e}")));
            return Ok(finish(shard_label, errors));
        }
    };
    let manifest_value = match stage_manifest(&manifest_bytes, &mut errors) {
        Some(v) => v,
        None => return Ok(finish(shard_label, errors)),
    };

    if !stage_crypto(root, trusted_key, &manifest_bytes, &mut errors)? {
        return Ok(finish(shard_label, errors));
    }

    let merkle_root = manifest::merkle_root_of(&manifest_value).unwrap_or_default().to_string();
    if !stage_merkle(root, &merkle_root, cfg, &mut errors)? {
        return Ok(finish(shard_label, errors));
    }

    let tables = match stage_schema(root, cfg, &mut errors) {
        Some(t) => t,
        None => return Ok(finish(shard_label, errors)),
    };

    if !stage_identity(&tables, &mut errors) {
        return Ok(finish(shard_label, errors));
    }

    let content_files = match stage_references(root, &tables, cfg, &mut errors) {
        Some(files) => files,
        None => return Ok(finish(shard_label, errors)),
    };

    stage_span_bytes(&content_files, &tables, &mut errors);

    Ok(finish(shard_label, errors))
}

fn finish(shard: String, errors: Vec<VerifyFinding>) -> VerifyReport {
    if errors.is_empty() {
        tracing::info!(%shard, "verify PASS");
    } else {
        tracing::warn!(%shard, count = errors.len(), "verify FAIL");
    }
    VerifyReport::new(shard, errors)
}

/// Stage 1: layout.
fn stage_layout(root: &Path, errors: &mut Vec<VerifyFinding>) -> AxmResult<bool> {
    layout::validate_root_layout(root, errors)
}

/// Stage 2: manifest. Returns the parsed value on success.
fn stage_manifest(bytes: &[u8], errors: &mut Vec<VerifyFinding>) -> Option<serde_json::Value> {
    if bytes.len() as u64 > MAX_MANIFEST_BYTES {
        errors.push(VerifyFinding::new(
            ErrorCode::EManifestSyntax,
            format!("manifest.json exceeds {MAX_MANIFEST_BYTES} bytes"),
        ));
        return None;
    }

    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            errors.push(VerifyFinding::new(ErrorCode::EManifestSyntax, format!("manifest.json is not valid JSON: {e}")));
            return None;
        }
    };

    if !manifest::validate_manifest_schema(&value, errors) {
        return None;
    }

    Some(value)
}

/// Stage 3: crypto anchor.
fn stage_crypto(root: &Path, trusted_key: &[u8], manifest_bytes: &[u8], errors: &mut Vec<VerifyFinding>) -> AxmResult<bool> {
    let embedded_key = match std::fs::read(root.join("sig/publisher.pub")) {
        Ok(b) => b,
        Err(e) => {
            errors.push(VerifyFinding::new(ErrorCode::ESigInvalid, format!("cannot read sig/publisher.pub: {e}")));
            return Ok(false);
        }
    };
    if embedded_key != trusted_key {
        errors.push(VerifyFinding::new(
            ErrorCode::ESigInvalid,
            "sig/publisher.pub does not match the supplied trusted key",
        ));
        return Ok(false);
    }

    let signature = match std::fs::read(root.join("sig/manifest.sig")) {
        Ok(b) => b,
        Err(e) => {
            errors.push(VerifyFinding::new(ErrorCode::ESigInvalid, format!("cannot read sig/manifest.sig: {e}")));
            return Ok(false);
        }
    };
    if signature.len() != crypto::SIG_LEN {
        errors.push(VerifyFinding::new(ErrorCode::ESigMissing, "sig/manifest.sig has the wrong length"));
        return Ok(false);
    }

    let ok = crypto::verify(trusted_key, manifest_bytes, &signature)?;
    if !ok {
        errors.push(VerifyFinding::new(ErrorCode::ESigInvalid, "manifest signature does not verify against the trusted key"));
        return Ok(false);
    }

    Ok(true)
}

/// Stage 4: Merkle recomputation.
fn stage_merkle(root: &Path, expected_root: &str, cfg: &CoreConfig, errors: &mut Vec<VerifyFinding>) -> AxmResult<bool> {
    if !layout::is_hex_64(expected_root) {
        errors.push(VerifyFinding::new(ErrorCode::EManifestSchema, "integrity.merkle_root is malformed"));
        return Ok(false);
    }

    let recomputed = merkle::compute_merkle_root(root, &cfg.merkle)?;
    if recomputed != expected_root {
        errors.push(VerifyFinding::new(
            ErrorCode::EMerkleMismatch,
            format!("recomputed merkle root {recomputed} does not match manifest {expected_root}"),
        ));
        return Ok(false);
    }

    Ok(true)
}

/// The four tables, decoded, passed between stages 5-8.
pub struct ShardTables {
    pub entities: Vec<crate::model::EntityRow>,
    pub claims: Vec<crate::model::ClaimRow>,
    pub provenance: Vec<crate::model::ProvenanceRow>,
    pub spans: Vec<crate::model::SpanRow>,
}

/// Stage 5: schema read validation for all four tables.
fn stage_schema(root: &Path, cfg: &CoreConfig, errors: &mut Vec<VerifyFinding>) -> Option<ShardTables> {
    let start = errors.len();

    let entities = read_checked(
        &root.join("graph/entities.parquet"),
        || table::entities::read(&root.join("graph/entities.parquet"), &cfg.tables),
        errors,
    );
    let claims = read_checked(
        &root.join("graph/claims.parquet"),
        || table::claims::read(&root.join("graph/claims.parquet"), &cfg.tables),
        errors,
    );
    let provenance = read_checked(
        &root.join("graph/provenance.parquet"),
        || table::provenance::read(&root.join("graph/provenance.parquet"), &cfg.tables),
        errors,
    );
    let spans = read_checked(
        &root.join("evidence/spans.parquet"),
        || table::spans::read(&root.join("evidence/spans.parquet"), &cfg.tables),
        errors,
    );

    if errors.len() != start {
        return None;
    }

    Some(ShardTables {
        entities: entities.unwrap(),
        claims: claims.unwrap(),
        provenance: provenance.unwrap(),
        spans: spans.unwrap(),
    })
}

fn read_checked<T>(path: &Path, read: impl FnOnce() -> AxmResult<Vec<T>>, errors: &mut Vec<VerifyFinding>) -> Option<Vec<T>> {
    match read() {
        Ok(rows) => Some(rows),
        Err(e) => {
            let code = classify_schema_error(&e);
            errors.push(VerifyFinding::new(code, format!("{}: {e}", path.display())));
            None
        }
    }
}

/// Map a table read failure onto the schema-stage error vocabulary. The
/// reader itself only distinguishes I/O, size/row limits, malformed
/// structure, and null cells through [`crate::errors::AxmError`]'s
/// generic variants; this is the one place that widens those back into
/// the spec's four distinct `E_SCHEMA_*` codes.
fn classify_schema_error(err: &crate::errors::AxmError) -> ErrorCode {
    use crate::errors::AxmError;
    match err {
        AxmError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => ErrorCode::ESchemaMissing,
        AxmError::Io(_) => ErrorCode::ESchemaRead,
        AxmError::LimitExceeded(_) => ErrorCode::ESchemaRead,
        AxmError::Serialization(_) => ErrorCode::ESchemaType,
        AxmError::Invariant(msg) if msg.contains("null") => ErrorCode::ESchemaNull,
        AxmError::Invariant(_) => ErrorCode::ESchemaType,
        _ => ErrorCode::ESchemaRead,
    }
}

/// Stage 6: identity re-derivation.
fn stage_identity(tables: &ShardTables, errors: &mut Vec<VerifyFinding>) -> bool {
    let start = errors.len();

    for e in &tables.entities {
        match identity::entity_id(&e.namespace, &e.label) {
            Ok(id) if id == e.entity_id => {}
            Ok(id) => errors.push(VerifyFinding::new(
                ErrorCode::EIdEntity,
                format!("entity {} recomputes to {id}", e.entity_id),
            )),
            Err(err) => errors.push(VerifyFinding::new(ErrorCode::EIdEntity, format!("entity {}: {err}", e.entity_id))),
        }
    }

    for c in &tables.claims {
        if !VALID_OBJECT_TYPES.contains(&c.object_type.as_str()) {
            errors.push(VerifyFinding::new(
                ErrorCode::ESchemaEnum,
                format!("claim {} has invalid object_type {}", c.claim_id, c.object_type),
            ));
            continue;
        }
        if !VALID_TIERS.contains(&(c.tier as i64)) {
            errors.push(VerifyFinding::new(
                ErrorCode::ESchemaEnum,
                format!("claim {} has invalid tier {}", c.claim_id, c.tier),
            ));
            continue;
        }
        match identity::claim_id(&c.subject, &c.predicate, &c.object, &c.object_type) {
            Ok(id) if id == c.claim_id => {}
            Ok(id) => errors.push(VerifyFinding::new(
                ErrorCode::EIdClaim,
                format!("claim {} recomputes to {id}", c.claim_id),
            )),
            Err(err) => errors.push(VerifyFinding::new(ErrorCode::EIdClaim, format!("claim {}: {err}", c.claim_id))),
        }
    }

    errors.len() == start
}

/// Content file metadata gathered while walking `content/` during stage 7,
/// keyed by SHA-256 hex digest. Stage 8 reuses this instead of re-walking.
type ContentFiles = BTreeMap<String, (std::path::PathBuf, u64)>;

/// Stage 7: referential integrity, including the content-tree scan.
/// Returns `None` if the stage found any error; otherwise the scanned
/// content files, handed to stage 8.
fn stage_references(root: &Path, tables: &ShardTables, cfg: &CoreConfig, errors: &mut Vec<VerifyFinding>) -> Option<ContentFiles> {
    let start = errors.len();

    let entity_ids: HashSet<&str> = tables.entities.iter().map(|e| e.entity_id.as_str()).collect();
    let claim_ids: HashSet<&str> = tables.claims.iter().map(|c| c.claim_id.as_str()).collect();

    for c in &tables.claims {
        if !entity_ids.contains(c.subject.as_str()) {
            errors.push(VerifyFinding::new(ErrorCode::ERefOrphan, format!("claim {} subject {} is not an entity", c.claim_id, c.subject)));
        }
        if c.object_type == "entity" && !entity_ids.contains(c.object.as_str()) {
            errors.push(VerifyFinding::new(ErrorCode::ERefOrphan, format!("claim {} object {} is not an entity", c.claim_id, c.object)));
        }
    }

    for p in &tables.provenance {
        if !claim_ids.contains(p.claim_id.as_str()) {
            errors.push(VerifyFinding::new(ErrorCode::ERefOrphan, format!("provenance {} references unknown claim {}", p.provenance_id, p.claim_id)));
        }
    }

    let content_files = scan_content_tree(&root.join("content"), cfg, errors);

    for p in &tables.provenance {
        match content_files.get(p.source_hash.as_str()) {
            Some(&(_, size)) => {
                if !(0 <= p.byte_start && p.byte_start <= p.byte_end && p.byte_end <= size as i64) {
                    errors.push(VerifyFinding::new(
                        ErrorCode::ERefSource,
                        format!("provenance {} has an out-of-range byte span", p.provenance_id),
                    ));
                }
            }
            None => errors.push(VerifyFinding::new(
                ErrorCode::ERefSource,
                format!("provenance {} source_hash {} matches no file in content/", p.provenance_id, p.source_hash),
            )),
        }
    }

    for s in &tables.spans {
        if !content_files.contains_key(s.source_hash.as_str()) {
            errors.push(VerifyFinding::new(
                ErrorCode::ERefSource,
                format!("span {} source_hash {} matches no file in content/", s.span_id, s.source_hash),
            ));
        }
    }

    if errors.len() != start {
        return None;
    }

    Some(content_files)
}

/// Stage 8: byte-exactness of every provenance and span. Reuses the
/// content-tree scan from stage 7 rather than walking `content/` again. A
/// source file that becomes unreadable between the two stages is reported
/// as `E_REF_READ`, not propagated.
fn stage_span_bytes(content_files: &ContentFiles, tables: &ShardTables, errors: &mut Vec<VerifyFinding>) {
    for p in &tables.provenance {
        if let Some((_, size)) = content_files.get(p.source_hash.as_str()) {
            let size = *size as i64;
            if !(0 <= p.byte_start && p.byte_start <= p.byte_end && p.byte_end <= size) {
                errors.push(VerifyFinding::new(ErrorCode::ERefSource, format!("provenance {} byte span out of bounds", p.provenance_id)));
            }
        }
    }

    for s in &tables.spans {
        let (path, _) = match content_files.get(s.source_hash.as_str()) {
            Some(entry) => entry,
            None => continue, // already reported in stage 7
        };
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                errors.push(VerifyFinding::new(ErrorCode::ERefRead, format!("span {} cannot read source file: {e}", s.span_id)));
                continue;
            }
        };
        let size = bytes.len() as i64;
        if !(0 <= s.byte_start && s.byte_start <= s.byte_end && s.byte_end <= size) {
            errors.push(VerifyFinding::new(ErrorCode::ERefSource, format!("span {} byte span out of bounds", s.span_id)));
            continue;
        }
        let slice = &bytes[s.byte_start as usize..s.byte_end as usize];
        match std::str::from_utf8(slice) {
            Ok(decoded) if decoded == s.text => {}
            Ok(decoded) => errors.push(VerifyFinding::new(
                ErrorCode::ERefSource,
                format!("span {} decodes to a different string than stored (got {decoded:?})", s.span_id),
            )),
            Err(_) => errors.push(VerifyFinding::new(
                ErrorCode::ERefSource,
                format!("span {} byte range is not valid UTF-8", s.span_id),
            )),
        }
    }
}

/// Walk `content/`, bounded per spec §4.8 stage 7, returning each file's
/// SHA-256 hex digest mapped to its path and byte length. Stage 8 reuses
/// the path to re-read exact byte ranges without walking the tree again.
///
/// Never propagates a hard error: a walk error, a symlink, an unreadable
/// file, or a resource-limit violation is pushed onto `errors` as
/// `E_REF_READ` and the walk stops there, matching the doc comment at the
/// top of this file — verification always ends in a report, never a crash.
fn scan_content_tree(content_root: &Path, cfg: &CoreConfig, errors: &mut Vec<VerifyFinding>) -> ContentFiles {
    let mut out = BTreeMap::new();
    let mut total_bytes: u64 = 0;
    let mut count: u64 = 0;
    let limits = &cfg.content_scan;

    for entry in WalkDir::new(content_root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                errors.push(VerifyFinding::new(ErrorCode::ERefRead, format!("content walk error: {e}")));
                break;
            }
        };
        if entry.file_type().is_symlink() {
            errors.push(VerifyFinding::new(
                ErrorCode::ERefRead,
                format!("symlink not permitted under content/: {}", entry.path().display()),
            ));
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                errors.push(VerifyFinding::new(ErrorCode::ERefRead, format!("cannot stat {}: {e}", entry.path().display())));
                continue;
            }
        };
        let size = metadata.len();
        if size > limits.max_file_bytes {
            errors.push(VerifyFinding::new(
                ErrorCode::ERefRead,
                format!("content file {} exceeds max_file_bytes", entry.path().display()),
            ));
            break;
        }
        total_bytes = match total_bytes.checked_add(size) {
            Some(t) => t,
            None => {
                errors.push(VerifyFinding::new(ErrorCode::ERefRead, "content byte count overflow"));
                break;
            }
        };
        count += 1;
        if count > limits.max_files {
            errors.push(VerifyFinding::new(ErrorCode::ERefRead, "content tree exceeds max_files"));
            break;
        }
        if total_bytes > limits.max_total_bytes {
            errors.push(VerifyFinding::new(ErrorCode::ERefRead, "content tree exceeds max_total_bytes"));
            break;
        }

        match sha256_file_hex(entry.path(), limits.hash_chunk_bytes) {
            Ok(hash) => {
                out.insert(hash, (entry.path().to_path_buf(), size));
            }
            Err(e) => {
                errors.push(VerifyFinding::new(ErrorCode::ERefRead, format!("cannot read {}: {e}", entry.path().display())));
                continue;
            }
        }
    }

    out
}

fn sha256_file_hex(path: &Path, chunk_bytes: usize) -> AxmResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_bytes];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, CompileRequest};
    use crate::manifest::Publisher;
    use std::fs;

    fn build_golden_shard(dir: &Path) -> (std::path::PathBuf, [u8; 32]) {
        let source_path = dir.join("source.txt");
        fs::write(&source_path, "pressure dressing controls severe bleeding\n").unwrap();
        let candidates_path = dir.join("candidates.jsonl");
        fs::write(
            &candidates_path,
            r#"{"subject":"pressure dressing","predicate":"treats","object":"severe bleeding","object_type":"entity","evidence":"controls severe bleeding"}"#,
        )
        .unwrap();
        let seed = [3u8; 32];
        let req = CompileRequest {
            source_path,
            candidates_path,
            out_dir: dir.join("shard"),
            seed,
            namespace: "ns".to_string(),
            publisher: Publisher { id: "pub1".to_string(), name: "Publisher One".to_string() },
            license: "CC-BY-4.0".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        compile(&req).unwrap();
        (req.out_dir, seed)
    }

    #[test]
    fn golden_shard_verifies_pass() {
        let dir = tempfile::tempdir().unwrap();
        let (shard, seed) = build_golden_shard(dir.path());
        let key = crypto::signing_key_from_seed(&seed).unwrap();
        let pubkey = crypto::public_key_bytes(&key);

        let report = verify_shard(&shard, &pubkey, VerifyMode::Strict, &CoreConfig::default()).unwrap();
        assert!(report.is_pass(), "{:?}", report.errors);
    }

    #[test]
    fn tampered_claims_table_fails_merkle() {
        let dir = tempfile::tempdir().unwrap();
        let (shard, seed) = build_golden_shard(dir.path());
        let key = crypto::signing_key_from_seed(&seed).unwrap();
        let pubkey = crypto::public_key_bytes(&key);

        let claims_path = shard.join("graph/claims.parquet");
        let mut bytes = fs::read(&claims_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&claims_path, bytes).unwrap();

        let report = verify_shard(&shard, &pubkey, VerifyMode::Strict, &CoreConfig::default()).unwrap();
        assert!(!report.is_pass());
        assert!(report.errors.iter().any(|e| e.code == ErrorCode::EMerkleMismatch));
    }

    #[test]
    fn wrong_trusted_key_fails_sig_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let (shard, _seed) = build_golden_shard(dir.path());
        let other_key = crypto::signing_key_from_seed(&[99u8; 32]).unwrap();
        let wrong_pubkey = crypto::public_key_bytes(&other_key);

        let report = verify_shard(&shard, &wrong_pubkey, VerifyMode::Strict, &CoreConfig::default()).unwrap();
        assert!(!report.is_pass());
        assert!(report.errors.iter().any(|e| e.code == ErrorCode::ESigInvalid));
    }

    #[test]
    fn short_merkle_root_rejected_at_manifest_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (shard, seed) = build_golden_shard(dir.path());
        let key = crypto::signing_key_from_seed(&seed).unwrap();
        let pubkey = crypto::public_key_bytes(&key);

        let manifest_path = shard.join("manifest.json");
        let text = fs::read_to_string(&manifest_path).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let short_root = "a".repeat(63);
        value["integrity"]["merkle_root"] = serde_json::Value::String(short_root);
        fs::write(&manifest_path, value.to_string()).unwrap();

        let report = verify_shard(&shard, &pubkey, VerifyMode::Strict, &CoreConfig::default()).unwrap();
        assert!(!report.is_pass());
        assert!(report.errors.iter().any(|e| e.code == ErrorCode::EManifestSchema));
    }
}
