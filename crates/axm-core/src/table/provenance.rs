//! `graph/provenance.parquet` (spec §3, §4.3). Sort key: `provenance_id`.

use std::path::Path;

use crate::config::TableLimits;
use crate::errors::AxmResult;
use crate::model::ProvenanceRow;

use super::{read_table, write_table, CellValue, ColumnSpec, ColumnType, TableSchema};

pub fn schema() -> TableSchema {
    TableSchema {
        columns: vec![
            ColumnSpec { name: "provenance_id", ty: ColumnType::Utf8 },
            ColumnSpec { name: "claim_id", ty: ColumnType::Utf8 },
            ColumnSpec { name: "source_hash", ty: ColumnType::Utf8 },
            ColumnSpec { name: "byte_start", ty: ColumnType::Int64 },
            ColumnSpec { name: "byte_end", ty: ColumnType::Int64 },
        ],
    }
}

pub fn write(path: &Path, rows: Vec<ProvenanceRow>) -> AxmResult<()> {
    let encoded = rows
        .into_iter()
        .map(|r| {
            vec![
                CellValue::Utf8(r.provenance_id),
                CellValue::Utf8(r.claim_id),
                CellValue::Utf8(r.source_hash),
                CellValue::Int64(r.byte_start),
                CellValue::Int64(r.byte_end),
            ]
        })
        .collect();
    write_table(path, &schema(), encoded, 0)
}

pub fn read(path: &Path, limits: &TableLimits) -> AxmResult<Vec<ProvenanceRow>> {
    let rows = read_table(path, &schema(), limits)?;
    rows.into_iter()
        .map(|row| {
            Ok(ProvenanceRow {
                provenance_id: row[0].as_str()?.to_string(),
                claim_id: row[1].as_str()?.to_string(),
                source_hash: row[2].as_str()?.to_string(),
                byte_start: row[3].as_i64()?,
                byte_end: row[4].as_i64()?,
            })
        })
        .collect()
}
