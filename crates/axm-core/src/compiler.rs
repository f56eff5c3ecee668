//! The shard compiler (spec §4.7): ingest a source document and a
//! candidate-claims stream, resolve entities, locate unambiguous evidence
//! spans, emit the four tables plus the signed manifest, and self-verify
//! before reporting success.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::candidate::{parse_candidates, Candidate};
use crate::canonical_json;
use crate::config::CoreConfig;
use crate::crypto;
use crate::identity::{self, VALID_OBJECT_TYPES, VALID_TIERS};
use crate::manifest::{self, ManifestInput, Publisher, SourceEntry};
use crate::merkle;
use crate::model::{ClaimRow, EntityRow, ProvenanceRow, SpanRow};
use crate::table;
use crate::verifier::{self, VerifyMode};
use crate::verify_error::VerifyReport;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("source is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("{0}")]
    Core(#[from] crate::errors::AxmError),
    #[error("evidence {evidence:?} occurs {count} times in the source; evidence must be unambiguous")]
    AmbiguousEvidence { evidence: String, count: usize },
    #[error("no claim survived candidate resolution; the build produced an empty output set")]
    EmptyClaimSet,
    #[error("self-verification of the freshly built shard failed: {0:?}")]
    SelfVerifyFailed(Vec<crate::verify_error::VerifyFinding>),
}

type CompileResult<T> = Result<T, CompileError>;

/// Everything the compiler needs to build one shard.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub source_path: PathBuf,
    pub candidates_path: PathBuf,
    pub out_dir: PathBuf,
    pub seed: [u8; 32],
    pub namespace: String,
    pub publisher: Publisher,
    pub license: String,
    pub created_at: String,
}

/// Summary returned on a successful compile.
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub out_dir: PathBuf,
    pub shard_id: String,
    pub merkle_root: String,
    pub entity_count: usize,
    pub claim_count: usize,
    pub skipped_candidates: usize,
}

/// Compile one shard per the spec §4.7 procedure. On any failure, the
/// partially written output directory is removed before returning.
pub fn compile(req: &CompileRequest) -> CompileResult<CompileReport> {
    match compile_inner(req) {
        Ok(report) => Ok(report),
        Err(e) => {
            let _ = fs::remove_dir_all(&req.out_dir);
            tracing::warn!(error = %e, "compile failed, removed partial output");
            Err(e)
        }
    }
}

fn compile_inner(req: &CompileRequest) -> CompileResult<CompileReport> {
    tracing::debug!(source = %req.source_path.display(), "reading source");
    let raw = fs::read(&req.source_path)?;
    let raw_text = std::str::from_utf8(&raw)?;
    let content_text = crate::text_normalize::normalize_source_text(raw_text);
    let content_bytes = content_text.as_bytes();

    let source_hash = hex::encode(Sha256::digest(content_bytes));
    tracing::debug!(%source_hash, bytes = content_bytes.len(), "normalized source");

    fs::create_dir_all(&req.out_dir)?;
    let content_dir = req.out_dir.join("content");
    fs::create_dir_all(&content_dir)?;
    fs::write(content_dir.join("source.txt"), content_bytes)?;

    let candidates_text = fs::read_to_string(&req.candidates_path)?;
    let candidates = parse_candidates(&candidates_text)?;
    tracing::debug!(count = candidates.len(), "parsed candidates stream");

    let (entity_rows, label_to_id) = resolve_entities(&req.namespace, &candidates)?;
    tracing::debug!(count = entity_rows.len(), "resolved entity set");

    let mut claim_rows = Vec::new();
    let mut provenance_rows = Vec::new();
    let mut span_rows = Vec::new();
    let mut skipped = 0usize;

    for candidate in &candidates {
        match resolve_claim(&req.namespace, candidate, &label_to_id, &source_hash, content_text.as_str())? {
            Some((claim, provenance, span)) => {
                claim_rows.push(claim);
                provenance_rows.push(provenance);
                span_rows.push(span);
            }
            None => skipped += 1,
        }
    }

    if claim_rows.is_empty() {
        return Err(CompileError::EmptyClaimSet);
    }
    tracing::debug!(claims = claim_rows.len(), skipped, "resolved claim set");

    let graph_dir = req.out_dir.join("graph");
    let evidence_dir = req.out_dir.join("evidence");
    fs::create_dir_all(&graph_dir)?;
    fs::create_dir_all(&evidence_dir)?;

    let entity_count = entity_rows.len();
    let claim_count = claim_rows.len();

    table::entities::write(&graph_dir.join("entities.parquet"), entity_rows)?;
    table::claims::write(&graph_dir.join("claims.parquet"), claim_rows)?;
    table::provenance::write(&graph_dir.join("provenance.parquet"), provenance_rows)?;
    table::spans::write(&evidence_dir.join("spans.parquet"), span_rows)?;
    tracing::debug!("wrote shard tables");

    let cfg = CoreConfig::default();
    let merkle_root = merkle::compute_merkle_root(&req.out_dir, &cfg.merkle)?;
    tracing::debug!(%merkle_root, "computed merkle root");

    let manifest_input = ManifestInput {
        namespace: req.namespace.clone(),
        publisher: req.publisher.clone(),
        license: req.license.clone(),
        sources: vec![SourceEntry { path: "content/source.txt".to_string(), hash: source_hash.clone() }],
        merkle_root: merkle_root.clone(),
        entity_count,
        claim_count,
        created_at: req.created_at.clone(),
    };
    let manifest_value = manifest::build_manifest(&manifest_input)?;
    let manifest_bytes = canonical_json::to_canonical_bytes(&manifest_value)?;
    fs::write(req.out_dir.join("manifest.json"), &manifest_bytes)?;

    let signing_key = crypto::signing_key_from_seed(&req.seed)?;
    let public_key = crypto::public_key_bytes(&signing_key);
    let signature = crypto::sign(&signing_key, &manifest_bytes);

    let sig_dir = req.out_dir.join("sig");
    fs::create_dir_all(&sig_dir)?;
    fs::write(sig_dir.join("publisher.pub"), public_key)?;
    fs::write(sig_dir.join("manifest.sig"), signature)?;
    tracing::debug!("wrote signed manifest");

    let report: VerifyReport = verifier::verify_shard(&req.out_dir, &public_key, VerifyMode::Strict, &cfg)?;
    if !report.is_pass() {
        tracing::warn!(errors = ?report.errors, "self-verification failed");
        return Err(CompileError::SelfVerifyFailed(report.errors));
    }
    tracing::info!(shard_id = %manifest::shard_id(&merkle_root), "compile succeeded");

    Ok(CompileReport {
        out_dir: req.out_dir.clone(),
        shard_id: manifest::shard_id(&merkle_root),
        merkle_root,
        entity_count,
        claim_count,
        skipped_candidates: skipped,
    })
}

/// Pass 1: collect the unique entity labels referenced by the candidate
/// stream and assign each a stable ID.
fn resolve_entities(
    namespace: &str,
    candidates: &[Candidate],
) -> CompileResult<(Vec<EntityRow>, BTreeMap<String, String>)> {
    let mut label_to_id: BTreeMap<String, String> = BTreeMap::new();

    for candidate in candidates {
        if let Some(subject) = candidate.subject.as_deref() {
            let trimmed = subject.trim();
            if !trimmed.is_empty() {
                label_to_id
                    .entry(trimmed.to_string())
                    .or_insert_with(|| String::new());
            }
        }
        if candidate.object_type_or_default() == "entity" {
            if let Some(object) = candidate.object.as_deref() {
                let trimmed = object.trim();
                if !trimmed.is_empty() {
                    label_to_id.entry(trimmed.to_string()).or_insert_with(|| String::new());
                }
            }
        }
    }

    let mut rows = Vec::with_capacity(label_to_id.len());
    for (label, id_slot) in label_to_id.iter_mut() {
        let entity_id = identity::entity_id(namespace, label)?;
        *id_slot = entity_id.clone();
        rows.push(EntityRow {
            entity_id,
            namespace: namespace.to_string(),
            label: label.clone(),
            entity_type: "concept".to_string(),
        });
    }

    Ok((rows, label_to_id))
}

/// Pass 2 for one candidate. Returns `Ok(None)` for a soft skip (invalid
/// enum, out-of-range tier, evidence not found), `Err` for a fatal
/// condition (ambiguous evidence).
fn resolve_claim(
    namespace: &str,
    candidate: &Candidate,
    label_to_id: &BTreeMap<String, String>,
    source_hash: &str,
    content_text: &str,
) -> CompileResult<Option<(ClaimRow, ProvenanceRow, SpanRow)>> {
    let subject = match candidate.subject.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(None),
    };
    let predicate = match candidate.predicate.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p,
        _ => return Ok(None),
    };
    let evidence = match candidate.evidence_text().map(str::trim) {
        Some(e) if !e.is_empty() => e,
        _ => return Ok(None),
    };
    // Unlike subject/predicate/evidence, an empty object is not a skip
    // condition: a literal object_type may legitimately carry an empty
    // string, so it flows through as "" rather than dropping the candidate.
    let object = candidate.object.as_deref().map(str::trim).unwrap_or("");

    let object_type = candidate.object_type_or_default();
    if !VALID_OBJECT_TYPES.contains(&object_type.as_str()) {
        return Ok(None);
    }

    let tier = candidate.tier_or_default().unwrap_or(0);
    if !VALID_TIERS.contains(&tier) {
        return Ok(None);
    }

    let subject_id = resolve_entity_ref(namespace, subject, label_to_id)?;
    let object_value = if object_type == "entity" {
        resolve_entity_ref(namespace, object, label_to_id)?
    } else {
        object.to_string()
    };

    let evidence_bytes = evidence.as_bytes();
    let occurrences = count_occurrences(content_text.as_bytes(), evidence_bytes);
    let byte_start = match occurrences.len() {
        0 => return Ok(None),
        1 => occurrences[0] as i64,
        n => {
            return Err(CompileError::AmbiguousEvidence { evidence: evidence.to_string(), count: n });
        }
    };
    let byte_end = byte_start + evidence_bytes.len() as i64;

    let claim_id = identity::claim_id(&subject_id, predicate, &object_value, &object_type)?;
    let provenance_id = identity::provenance_id(source_hash, byte_start, byte_end);
    let span_id = identity::span_id(source_hash, byte_start, byte_end, evidence);

    let claim = ClaimRow {
        claim_id: claim_id.clone(),
        subject: subject_id,
        predicate: predicate.to_string(),
        object: object_value,
        object_type,
        tier: tier as i8,
    };
    let provenance = ProvenanceRow {
        provenance_id,
        claim_id,
        source_hash: source_hash.to_string(),
        byte_start,
        byte_end,
    };
    let span = SpanRow {
        span_id,
        source_hash: source_hash.to_string(),
        byte_start,
        byte_end,
        text: evidence.to_string(),
    };

    Ok(Some((claim, provenance, span)))
}

/// Resolve a trimmed label to its entity ID via the pass-1 map, falling
/// back to direct recomputation (spec §4.7 step 3).
fn resolve_entity_ref(namespace: &str, label: &str, label_to_id: &BTreeMap<String, String>) -> CompileResult<String> {
    if let Some(id) = label_to_id.get(label) {
        if !id.is_empty() {
            return Ok(id.clone());
        }
    }
    Ok(identity::entity_id(namespace, label)?)
}

/// Return every non-overlapping start offset at which `needle` occurs in
/// `haystack`, up to two occurrences (enough to detect ambiguity without
/// scanning the whole buffer when evidence repeats densely).
fn count_occurrences(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let mut hits = Vec::new();
    let mut start = 0usize;
    while let Some(pos) = find_subslice(&haystack[start..], needle) {
        hits.push(start + pos);
        start += pos + 1;
        if hits.len() >= 2 {
            break;
        }
    }
    hits
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_candidates(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("candidates.jsonl");
        fs::write(&path, text).unwrap();
        path
    }

    fn base_request(dir: &Path, source_text: &str, candidates_text: &str) -> CompileRequest {
        let source_path = dir.join("source.txt");
        fs::write(&source_path, source_text).unwrap();
        let candidates_path = write_candidates(dir, candidates_text);
        CompileRequest {
            source_path,
            candidates_path,
            out_dir: dir.join("shard"),
            seed: [9u8; 32],
            namespace: "ns".to_string(),
            publisher: Publisher { id: "pub1".to_string(), name: "Publisher One".to_string() },
            license: "CC-BY-4.0".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn compiles_and_self_verifies_the_golden_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let source = "pressure dressing controls severe bleeding\n";
        let candidates = r#"{"subject":"pressure dressing","predicate":"treats","object":"severe bleeding","object_type":"entity","evidence":"controls severe bleeding"}"#;
        let req = base_request(dir.path(), source, candidates);

        let report = compile(&req).unwrap();
        assert_eq!(report.entity_count, 2);
        assert_eq!(report.claim_count, 1);
        assert!(report.shard_id.starts_with("shard_blake3_"));

        let spans = table::spans::read(
            &req.out_dir.join("evidence/spans.parquet"),
            &CoreConfig::default().tables,
        )
        .unwrap();
        assert_eq!(spans[0].text, "controls severe bleeding");
    }

    #[test]
    fn ambiguous_evidence_aborts_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = r#"{"subject":"x","predicate":"p","object":"y","evidence":"ab"}"#;
        let req = base_request(dir.path(), "ab ab\n", candidates);

        let err = compile(&req).unwrap_err();
        assert!(matches!(err, CompileError::AmbiguousEvidence { .. }));
        assert!(!req.out_dir.exists());
    }

    #[test]
    fn not_found_evidence_is_a_soft_skip() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = format!(
            "{}\n{}",
            r#"{"subject":"x","predicate":"p","object":"y","evidence":"not present anywhere"}"#,
            r#"{"subject":"pressure","predicate":"treats","object":"wounds","evidence":"real text"}"#
        );
        let req = base_request(dir.path(), "real text\n", &candidates);

        let report = compile(&req).unwrap();
        assert_eq!(report.claim_count, 1);
        assert_eq!(report.skipped_candidates, 1);
    }

    #[test]
    fn empty_claim_set_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = r#"{"subject":"x","predicate":"p","object":"y","evidence":"nowhere"}"#;
        let req = base_request(dir.path(), "completely unrelated text\n", candidates);

        let err = compile(&req).unwrap_err();
        assert!(matches!(err, CompileError::EmptyClaimSet));
    }

    #[test]
    fn out_of_range_tier_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = format!(
            "{}\n{}",
            r#"{"subject":"x","predicate":"p","object":"y","evidence":"bad tier here","tier":5}"#,
            r#"{"subject":"a","predicate":"b","object":"c","evidence":"good tier here","tier":1}"#
        );
        let req = base_request(dir.path(), "bad tier here and good tier here\n", &candidates);

        let report = compile(&req).unwrap();
        assert_eq!(report.claim_count, 1);
        assert_eq!(report.skipped_candidates, 1);
    }
}
