use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use axm_core::prelude::*;

use crate::output;

pub struct CompileArgs {
    pub source: PathBuf,
    pub candidates: PathBuf,
    pub out: PathBuf,
    pub key: Option<String>,
    pub namespace: String,
    pub publisher_id: String,
    pub publisher_name: String,
    pub created_at: String,
    pub license: String,
}

#[derive(Debug, Serialize)]
pub struct CompileOut {
    pub ok: bool,
    pub shard_id: String,
    pub merkle_root: String,
    pub out_dir: String,
    pub entity_count: usize,
    pub claim_count: usize,
    pub skipped_candidates: usize,
}

pub fn run(args: CompileArgs) -> Result<i32> {
    let seed = resolve_seed(args.key.as_deref())?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message(format!("compiling {}", args.source.display()));

    let req = CompileRequest {
        source_path: args.source,
        candidates_path: args.candidates,
        out_dir: args.out,
        seed,
        namespace: args.namespace,
        publisher: Publisher { id: args.publisher_id, name: args.publisher_name },
        license: args.license,
        created_at: args.created_at,
    };

    let result = compile(&req);
    pb.finish_and_clear();

    match result {
        Ok(report) => {
            let out = CompileOut {
                ok: true,
                shard_id: report.shard_id.clone(),
                merkle_root: report.merkle_root,
                out_dir: report.out_dir.display().to_string(),
                entity_count: report.entity_count,
                claim_count: report.claim_count,
                skipped_candidates: report.skipped_candidates,
            };
            if output::is_json() {
                output::print_json(&out)?;
            } else {
                println!(
                    "{} : {} entities, {} claims ({} skipped) -> {}",
                    out.shard_id, out.entity_count, out.claim_count, out.skipped_candidates, out.out_dir
                );
            }
            Ok(0)
        }
        Err(e) => {
            if output::is_json() {
                output::print_json(&serde_json::json!({ "ok": false, "error": e.to_string() }))?;
            }
            output::eprintln_line(&format!("compile failed: {e}"));
            Ok(1)
        }
    }
}

/// Resolve the 32-byte Ed25519 seed from `--key`, falling back to
/// `AXM_PRIVATE_KEY`. This is the only place in the CLI that reads the
/// environment for key material.
fn resolve_seed(key_hex: Option<&str>) -> Result<[u8; 32]> {
    let hex_str = match key_hex {
        Some(s) => s.to_string(),
        None => std::env::var("AXM_PRIVATE_KEY")
            .map_err(|_| anyhow!("a signing key is required: pass --key or set AXM_PRIVATE_KEY"))?,
    };
    let bytes = hex::decode(hex_str.trim()).context("signing key must be hex-encoded")?;
    if bytes.len() != 32 {
        return Err(anyhow!("signing key must decode to exactly 32 bytes, got {}", bytes.len()));
    }
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&bytes);
    Ok(seed)
}
