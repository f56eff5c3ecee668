use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use axm_core::prelude::*;

use crate::output;

pub struct VerifyArgs {
    pub path: PathBuf,
    pub trusted_key: PathBuf,
    pub mode: String,
}

pub fn run(args: VerifyArgs) -> Result<i32> {
    if args.mode != "strict" {
        return Err(anyhow!("unsupported verify mode: {} (only \"strict\" is implemented)", args.mode));
    }

    let raw_key = fs::read(&args.trusted_key)
        .with_context(|| format!("reading trusted key {}", args.trusted_key.display()))?;
    let trusted_key = decode_trusted_key(&raw_key)?;

    let cfg = CoreConfig::default();
    let report = verify_shard(&args.path, &trusted_key, VerifyMode::Strict, &cfg)?;

    if output::is_json() {
        output::print_json(&report)?;
    } else if report.is_pass() {
        println!("{}: PASS", report.shard);
    } else {
        println!("{}: FAIL ({} error(s))", report.shard, report.error_count);
        for finding in &report.errors {
            println!("  {} {}", finding.code, finding.message);
        }
    }

    Ok(if report.is_pass() { 0 } else { 1 })
}

/// Accept either raw 32-byte key material or a hex-encoded text file.
fn decode_trusted_key(raw: &[u8]) -> Result<[u8; 32]> {
    if raw.len() == 32 {
        let mut buf = [0u8; 32];
        buf.copy_from_slice(raw);
        return Ok(buf);
    }

    let text = std::str::from_utf8(raw).context("trusted key file is neither 32 raw bytes nor UTF-8 hex")?;
    let bytes = hex::decode(text.trim()).context("trusted key file is not valid hex")?;
    if bytes.len() != 32 {
        return Err(anyhow!("trusted key must decode to exactly 32 bytes, got {}", bytes.len()));
    }
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&bytes);
    Ok(buf)
}
