//! Black-box tests for the compile -> verify round trip: a freshly built
//! shard must verify PASS against its own public key, any on-disk tamper
//! must be caught by the matching stage, and verification against the
//! wrong trusted key must fail at the crypto-anchor stage rather than
//! silently accepting an impostor shard.

use std::fs;

use axm_core::prelude::*;

fn build_shard(dir: &std::path::Path) -> (std::path::PathBuf, [u8; 32]) {
    let source = dir.join("source.txt");
    fs::write(&source, "the liver metabolizes acetaminophen into toxic byproducts\n").unwrap();
    let candidates = dir.join("candidates.jsonl");
    fs::write(
        &candidates,
        r#"{"subject":"liver","predicate":"metabolizes","object":"acetaminophen","object_type":"entity","evidence":"metabolizes acetaminophen"}"#,
    )
    .unwrap();

    let seed = [11u8; 32];
    let req = CompileRequest {
        source_path: source,
        candidates_path: candidates,
        out_dir: dir.join("shard"),
        seed,
        namespace: "toxicology".to_string(),
        publisher: Publisher { id: "pub-1".to_string(), name: "Reference Publisher".to_string() },
        license: "CC-BY-4.0".to_string(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
    };
    compile(&req).unwrap();
    (req.out_dir, seed)
}

fn trusted_key_for(seed: &[u8; 32]) -> [u8; 32] {
    use axm_core::crypto;
    let key = crypto::signing_key_from_seed(seed).unwrap();
    crypto::public_key_bytes(&key)
}

#[test]
fn fresh_shard_verifies_pass_against_its_own_key() {
    let dir = tempfile::tempdir().unwrap();
    let (shard, seed) = build_shard(dir.path());
    let trusted_key = trusted_key_for(&seed);

    let report = verify_shard(&shard, &trusted_key, VerifyMode::Strict, &CoreConfig::default()).unwrap();
    assert!(report.is_pass(), "{:?}", report.errors);
}

#[test]
fn tampered_source_text_is_caught_by_merkle_stage() {
    let dir = tempfile::tempdir().unwrap();
    let (shard, seed) = build_shard(dir.path());
    let trusted_key = trusted_key_for(&seed);

    fs::write(shard.join("content/source.txt"), "the liver metabolizes something else entirely\n").unwrap();

    let report = verify_shard(&shard, &trusted_key, VerifyMode::Strict, &CoreConfig::default()).unwrap();
    assert!(!report.is_pass());
    assert!(report.errors.iter().any(|e| e.code == ErrorCode::EMerkleMismatch));
}

#[test]
fn missing_signature_file_is_caught_by_layout_stage() {
    let dir = tempfile::tempdir().unwrap();
    let (shard, seed) = build_shard(dir.path());
    let trusted_key = trusted_key_for(&seed);

    fs::remove_file(shard.join("sig/manifest.sig")).unwrap();

    let report = verify_shard(&shard, &trusted_key, VerifyMode::Strict, &CoreConfig::default()).unwrap();
    assert!(!report.is_pass());
    assert!(report.errors.iter().any(|e| e.code == ErrorCode::ELayoutMissing));
}

#[test]
fn verification_against_an_untrusted_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (shard, _seed) = build_shard(dir.path());
    let impostor_key = trusted_key_for(&[222u8; 32]);

    let report = verify_shard(&shard, &impostor_key, VerifyMode::Strict, &CoreConfig::default()).unwrap();
    assert!(!report.is_pass());
    assert!(report.errors.iter().any(|e| e.code == ErrorCode::ESigInvalid));
}

#[test]
fn corrupted_manifest_json_is_caught_before_signature_checking() {
    let dir = tempfile::tempdir().unwrap();
    let (shard, seed) = build_shard(dir.path());
    let trusted_key = trusted_key_for(&seed);

    fs::write(shard.join("manifest.json"), b"{not valid json").unwrap();

    let report = verify_shard(&shard, &trusted_key, VerifyMode::Strict, &CoreConfig::default()).unwrap();
    assert!(!report.is_pass());
    assert!(report.errors.iter().any(|e| e.code == ErrorCode::EManifestSyntax));
}
