//! `evidence/spans.parquet` (spec §3, §4.3). Sort key: `span_id`.

use std::path::Path;

use crate::config::TableLimits;
use crate::errors::AxmResult;
use crate::model::SpanRow;

use super::{read_table, write_table, CellValue, ColumnSpec, ColumnType, TableSchema};

pub fn schema() -> TableSchema {
    TableSchema {
        columns: vec![
            ColumnSpec { name: "span_id", ty: ColumnType::Utf8 },
            ColumnSpec { name: "source_hash", ty: ColumnType::Utf8 },
            ColumnSpec { name: "byte_start", ty: ColumnType::Int64 },
            ColumnSpec { name: "byte_end", ty: ColumnType::Int64 },
            ColumnSpec { name: "text", ty: ColumnType::Utf8 },
        ],
    }
}

pub fn write(path: &Path, rows: Vec<SpanRow>) -> AxmResult<()> {
    let encoded = rows
        .into_iter()
        .map(|r| {
            vec![
                CellValue::Utf8(r.span_id),
                CellValue::Utf8(r.source_hash),
                CellValue::Int64(r.byte_start),
                CellValue::Int64(r.byte_end),
                CellValue::Utf8(r.text),
            ]
        })
        .collect();
    write_table(path, &schema(), encoded, 0)
}

pub fn read(path: &Path, limits: &TableLimits) -> AxmResult<Vec<SpanRow>> {
    let rows = read_table(path, &schema(), limits)?;
    rows.into_iter()
        .map(|row| {
            Ok(SpanRow {
                span_id: row[0].as_str()?.to_string(),
                source_hash: row[1].as_str()?.to_string(),
                byte_start: row[2].as_i64()?,
                byte_end: row[3].as_i64()?,
                text: row[4].as_str()?.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spans.axmt1");
        let rows = vec![SpanRow {
            span_id: "s_abc".into(),
            source_hash: "0".repeat(64),
            byte_start: 0,
            byte_end: 5,
            text: "hello".into(),
        }];
        write(&path, rows.clone()).unwrap();
        let read_back = read(&path, &TableLimits::default()).unwrap();
        assert_eq!(read_back, rows);
    }
}
