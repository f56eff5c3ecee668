//! Stable, machine-readable verifier error codes (spec §4.8).
//!
//! These strings are part of the wire contract: any consumer of
//! `axm verify --json` matches on `code`, so the variant names and their
//! `Display` output must never change once shipped.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    ELayoutDirty,
    ELayoutMissing,
    ELayoutType,
    EDotfile,
    EManifestSyntax,
    EManifestSchema,
    ESigMissing,
    ESigInvalid,
    EMerkleMismatch,
    ESchemaRead,
    ESchemaMissing,
    ESchemaType,
    ESchemaNull,
    ESchemaEnum,
    EIdEntity,
    EIdClaim,
    ERefOrphan,
    ERefSource,
    ERefRead,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ELayoutDirty => "E_LAYOUT_DIRTY",
            ErrorCode::ELayoutMissing => "E_LAYOUT_MISSING",
            ErrorCode::ELayoutType => "E_LAYOUT_TYPE",
            ErrorCode::EDotfile => "E_DOTFILE",
            ErrorCode::EManifestSyntax => "E_MANIFEST_SYNTAX",
            ErrorCode::EManifestSchema => "E_MANIFEST_SCHEMA",
            ErrorCode::ESigMissing => "E_SIG_MISSING",
            ErrorCode::ESigInvalid => "E_SIG_INVALID",
            ErrorCode::EMerkleMismatch => "E_MERKLE_MISMATCH",
            ErrorCode::ESchemaRead => "E_SCHEMA_READ",
            ErrorCode::ESchemaMissing => "E_SCHEMA_MISSING",
            ErrorCode::ESchemaType => "E_SCHEMA_TYPE",
            ErrorCode::ESchemaNull => "E_SCHEMA_NULL",
            ErrorCode::ESchemaEnum => "E_SCHEMA_ENUM",
            ErrorCode::EIdEntity => "E_ID_ENTITY",
            ErrorCode::EIdClaim => "E_ID_CLAIM",
            ErrorCode::ERefOrphan => "E_REF_ORPHAN",
            ErrorCode::ERefSource => "E_REF_SOURCE",
            ErrorCode::ERefRead => "E_REF_READ",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accumulated finding from a verification stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyFinding {
    pub code: ErrorCode,
    pub message: String,
}

impl VerifyFinding {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerifyStatus {
    Pass,
    Fail,
}

/// The full result of verifying one shard.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub shard: String,
    pub status: VerifyStatus,
    pub error_count: usize,
    pub errors: Vec<VerifyFinding>,
}

impl VerifyReport {
    pub fn new(shard: impl Into<String>, errors: Vec<VerifyFinding>) -> Self {
        let status = if errors.is_empty() { VerifyStatus::Pass } else { VerifyStatus::Fail };
        Self { shard: shard.into(), status, error_count: errors.len(), errors }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self.status, VerifyStatus::Pass)
    }
}
