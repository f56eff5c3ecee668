//! Row types shared by the table writer/reader, the compiler, and the
//! verifier (spec §3, §4.3).

use serde::{Deserialize, Serialize};

/// A row in `graph/entities.parquet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRow {
    pub entity_id: String,
    pub namespace: String,
    pub label: String,
    pub entity_type: String,
}

/// A row in `graph/claims.parquet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRow {
    pub claim_id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub object_type: String,
    pub tier: i8,
}

/// A row in `graph/provenance.parquet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRow {
    pub provenance_id: String,
    pub claim_id: String,
    pub source_hash: String,
    pub byte_start: i64,
    pub byte_end: i64,
}

/// A row in `evidence/spans.parquet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRow {
    pub span_id: String,
    pub source_hash: String,
    pub byte_start: i64,
    pub byte_end: i64,
    pub text: String,
}
