//! `graph/entities.parquet` (spec §3, §4.3). Sort key: `entity_id`.

use std::path::Path;

use crate::config::TableLimits;
use crate::errors::AxmResult;
use crate::model::EntityRow;

use super::{read_table, write_table, CellValue, ColumnSpec, ColumnType, TableSchema};

pub fn schema() -> TableSchema {
    TableSchema {
        columns: vec![
            ColumnSpec { name: "entity_id", ty: ColumnType::Utf8 },
            ColumnSpec { name: "namespace", ty: ColumnType::Utf8 },
            ColumnSpec { name: "label", ty: ColumnType::Utf8 },
            ColumnSpec { name: "entity_type", ty: ColumnType::Utf8 },
        ],
    }
}

pub fn write(path: &Path, rows: Vec<EntityRow>) -> AxmResult<()> {
    let encoded = rows
        .into_iter()
        .map(|r| {
            vec![
                CellValue::Utf8(r.entity_id),
                CellValue::Utf8(r.namespace),
                CellValue::Utf8(r.label),
                CellValue::Utf8(r.entity_type),
            ]
        })
        .collect();
    write_table(path, &schema(), encoded, 0)
}

pub fn read(path: &Path, limits: &TableLimits) -> AxmResult<Vec<EntityRow>> {
    let rows = read_table(path, &schema(), limits)?;
    rows.into_iter()
        .map(|row| {
            Ok(EntityRow {
                entity_id: row[0].as_str()?.to_string(),
                namespace: row[1].as_str()?.to_string(),
                label: row[2].as_str()?.to_string(),
                entity_type: row[3].as_str()?.to_string(),
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
        let path = dir.path().join("entities.axmt1");
        let rows = vec![EntityRow {
            entity_id: "e_abc".into(),
            namespace: "ns".into(),
            label: "aspirin".into(),
            entity_type: "concept".into(),
        }];
        write(&path, rows.clone()).unwrap();
        let read_back = read(&path, &TableLimits::default()).unwrap();
        assert_eq!(read_back, rows);
    }
}
