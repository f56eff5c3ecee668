//! `graph/claims.parquet` (spec §3, §4.3). Sort key: `claim_id`.

use std::path::Path;

use crate::config::TableLimits;
use crate::errors::AxmResult;
use crate::model::ClaimRow;

use super::{read_table, write_table, CellValue, ColumnSpec, ColumnType, TableSchema};

pub fn schema() -> TableSchema {
    TableSchema {
        columns: vec![
            ColumnSpec { name: "claim_id", ty: ColumnType::Utf8 },
            ColumnSpec { name: "subject", ty: ColumnType::Utf8 },
            ColumnSpec { name: "predicate", ty: ColumnType::Utf8 },
            ColumnSpec { name: "object", ty: ColumnType::Utf8 },
            ColumnSpec { name: "object_type", ty: ColumnType::Utf8 },
            ColumnSpec { name: "tier", ty: ColumnType::Int8 },
        ],
    }
}

pub fn write(path: &Path, rows: Vec<ClaimRow>) -> AxmResult<()> {
    let encoded = rows
        .into_iter()
        .map(|r| {
            vec![
                CellValue::Utf8(r.claim_id),
                CellValue::Utf8(r.subject),
                CellValue::Utf8(r.predicate),
                CellValue::Utf8(r.object),
                CellValue::Utf8(r.object_type),
                CellValue::Int8(r.tier),
            ]
        })
        .collect();
    write_table(path, &schema(), encoded, 0)
}

pub fn read(path: &Path, limits: &TableLimits) -> AxmResult<Vec<ClaimRow>> {
    let rows = read_table(path, &schema(), limits)?;
    rows.into_iter()
        .map(|row| {
            Ok(ClaimRow {
                claim_id: row[0].as_str()?.to_string(),
                subject: row[1].as_str()?.to_string(),
                predicate: row[2].as_str()?.to_string(),
                object: row[3].as_str()?.to_string(),
                object_type: row[4].as_str()?.to_string(),
                tier: row[5].as_i8()?,
            })
        })
        .collect()
}
