//! Configuration structures for axm-core.
//!
//! These are explicit, serializable configuration objects used by the
//! compiler, the verifier, the table reader, and the Merkle hasher to
//! control resource ceilings. The core crate itself does not read
//! environment variables; all configuration must be supplied explicitly by
//! the caller (the CLI) to preserve determinism.

use crate::errors::{AxmError, AxmResult};

/// Ceilings applied by the table reader (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLimits {
    pub max_file_bytes: u64,
    pub max_rows: u64,
}

impl Default for TableLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 512 * 1024 * 1024,
            max_rows: 1_000_000,
        }
    }
}

/// Ceilings applied by the Merkle hasher when walking a shard root (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerkleLimits {
    pub max_file_bytes: u64,
    pub max_total_bytes: u64,
    pub max_files: u64,
    pub hash_chunk_bytes: usize,
}

impl Default for MerkleLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 512 * 1024 * 1024,
            max_total_bytes: 2 * 1024 * 1024 * 1024,
            max_files: 100_000,
            hash_chunk_bytes: 64 * 1024,
        }
    }
}

/// Ceilings applied by the verifier when scanning `content/` (spec §4.8 stage 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentScanLimits {
    pub max_file_bytes: u64,
    pub max_total_bytes: u64,
    pub max_files: u64,
    pub hash_chunk_bytes: usize,
}

impl Default for ContentScanLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 512 * 1024 * 1024,
            max_total_bytes: 2 * 1024 * 1024 * 1024,
            max_files: 10_000,
            hash_chunk_bytes: 64 * 1024,
        }
    }
}

/// Manifest size ceiling (spec §4.8 stage 2).
pub const MAX_MANIFEST_BYTES: u64 = 256 * 1024;

/// Full configuration container passed explicitly into the compiler and
/// verifier entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreConfig {
    pub tables: TableLimits,
    pub merkle: MerkleLimits,
    pub content_scan: ContentScanLimits,
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &CoreConfig) -> AxmResult<()> {
    if cfg.tables.max_rows == 0 {
        return Err(AxmError::invalid_argument("tables.max_rows must be greater than zero"));
    }
    if cfg.merkle.max_files == 0 {
        return Err(AxmError::invalid_argument("merkle.max_files must be greater than zero"));
    }
    if cfg.merkle.max_file_bytes > cfg.merkle.max_total_bytes {
        return Err(AxmError::invalid_argument(
            "merkle.max_file_bytes must not exceed merkle.max_total_bytes",
        ));
    }
    if cfg.content_scan.max_file_bytes > cfg.content_scan.max_total_bytes {
        return Err(AxmError::invalid_argument(
            "content_scan.max_file_bytes must not exceed content_scan.max_total_bytes",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = CoreConfig::default();
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn invalid_merkle_limits_detected() {
        let mut cfg = CoreConfig::default();
        cfg.merkle.max_file_bytes = cfg.merkle.max_total_bytes + 1;
        assert!(validate_config(&cfg).is_err());
    }
}
