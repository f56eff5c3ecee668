//! The `AXMT1` deterministic tabular container (spec §4.3).
//!
//! A hand-specified binary format stands in for the reference
//! implementation's Parquet writer: fixed schema, no compression, no
//! dictionary encoding, no statistics, rows sorted by primary key before
//! writing. Layout:
//!
//! ```text
//! magic:        6 bytes   b"AXMT1\0"
//! column_count: u32 LE
//! columns:      column_count * { name_len:u32 LE, name:utf8, type_tag:u8 }
//! row_count:    u64 LE
//! rows:         row_count * { column_count * { presence:u8, value } }
//! ```
//!
//! `type_tag`: `1 = Utf8`, `2 = Int64`, `3 = Int8`. `presence = 0` marks a
//! null cell; the writer never emits one, and the reader rejects any it
//! finds so "no null in any column" holds even if a file is hand-edited.

pub mod claims;
pub mod entities;
pub mod provenance;
pub mod spans;

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::config::TableLimits;
use crate::errors::{AxmError, AxmResult};

const MAGIC: &[u8; 6] = b"AXMT1\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Utf8,
    Int64,
    Int8,
}

impl ColumnType {
    fn tag(self) -> u8 {
        match self {
            ColumnType::Utf8 => 1,
            ColumnType::Int64 => 2,
            ColumnType::Int8 => 3,
        }
    }

    fn from_tag(tag: u8) -> AxmResult<Self> {
        match tag {
            1 => Ok(ColumnType::Utf8),
            2 => Ok(ColumnType::Int64),
            3 => Ok(ColumnType::Int8),
            other => Err(AxmError::serialization(format!("unknown column type tag {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Utf8(String),
    Int64(i64),
    Int8(i8),
}

impl CellValue {
    fn type_of(&self) -> ColumnType {
        match self {
            CellValue::Utf8(_) => ColumnType::Utf8,
            CellValue::Int64(_) => ColumnType::Int64,
            CellValue::Int8(_) => ColumnType::Int8,
        }
    }

    pub fn as_str(&self) -> AxmResult<&str> {
        match self {
            CellValue::Utf8(s) => Ok(s.as_str()),
            _ => Err(AxmError::invariant("expected a Utf8 cell")),
        }
    }

    pub fn as_i64(&self) -> AxmResult<i64> {
        match self {
            CellValue::Int64(v) => Ok(*v),
            _ => Err(AxmError::invariant("expected an Int64 cell")),
        }
    }

    pub fn as_i8(&self) -> AxmResult<i8> {
        match self {
            CellValue::Int8(v) => Ok(*v),
            _ => Err(AxmError::invariant("expected an Int8 cell")),
        }
    }
}

/// Write a table to `path`, sorting rows by `sort_key_index` (the primary
/// key column) before serialization. Writing never emits a null cell.
pub fn write_table(
    path: &Path,
    schema: &TableSchema,
    mut rows: Vec<Vec<CellValue>>,
    sort_key_index: usize,
) -> AxmResult<()> {
    for row in &rows {
        if row.len() != schema.columns.len() {
            return Err(AxmError::invariant("row arity does not match schema"));
        }
        for (cell, col) in row.iter().zip(&schema.columns) {
            if cell.type_of() != col.ty {
                return Err(AxmError::invariant(format!(
                    "column {} type mismatch",
                    col.name
                )));
            }
        }
    }

    rows.sort_by(|a, b| sort_key_bytes(&a[sort_key_index]).cmp(&sort_key_bytes(&b[sort_key_index])));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&(schema.columns.len() as u32).to_le_bytes());
    for col in &schema.columns {
        let name_bytes = col.name.as_bytes();
        buf.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(name_bytes);
        buf.push(col.ty.tag());
    }
    buf.extend_from_slice(&(rows.len() as u64).to_le_bytes());

    for row in &rows {
        for cell in row {
            buf.push(1u8); // presence: the writer never emits nulls.
            write_cell(cell, &mut buf);
        }
    }

    let mut file = fs::File::create(path)?;
    file.write_all(&buf)?;
    Ok(())
}

fn sort_key_bytes(cell: &CellValue) -> Vec<u8> {
    match cell {
        CellValue::Utf8(s) => s.as_bytes().to_vec(),
        CellValue::Int64(v) => v.to_be_bytes().to_vec(),
        CellValue::Int8(v) => v.to_be_bytes().to_vec(),
    }
}

fn write_cell(cell: &CellValue, buf: &mut Vec<u8>) {
    match cell {
        CellValue::Utf8(s) => {
            let bytes = s.as_bytes();
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
        CellValue::Int64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        CellValue::Int8(v) => buf.push(*v as u8),
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> AxmResult<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(AxmError::serialization("unexpected end of table data"));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> AxmResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> AxmResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn u64(&mut self) -> AxmResult<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn i64(&mut self) -> AxmResult<i64> {
        let bytes = self.take(8)?;
        Ok(i64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn utf8(&mut self, len: usize) -> AxmResult<String> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| AxmError::serialization(e.to_string()))
    }
}

/// Read and validate a table against `expected`, enforcing the file-size
/// and row-count ceilings before any row buffer is allocated.
///
/// Column count, names, and types must match `expected` exactly (column
/// order and count, not just set membership). Any cell found with
/// `presence == 0` is rejected, preserving "no null in any column" even
/// for a hand-edited file.
pub fn read_table(path: &Path, expected: &TableSchema, limits: &TableLimits) -> AxmResult<Vec<Vec<CellValue>>> {
    let metadata = fs::metadata(path)?;
    if metadata.len() > limits.max_file_bytes {
        return Err(AxmError::limit_exceeded(format!(
            "{} exceeds file size limit ({} bytes)",
            path.display(),
            limits.max_file_bytes
        )));
    }

    let data = fs::read(path)?;
    let mut r = Reader::new(&data);

    let magic = r.take(6)?;
    if magic != MAGIC {
        return Err(AxmError::serialization("bad AXMT1 magic"));
    }

    let column_count = r.u32()? as usize;
    if column_count != expected.columns.len() {
        return Err(AxmError::serialization(format!(
            "column count mismatch: expected {}, got {column_count}",
            expected.columns.len()
        )));
    }

    let mut columns = Vec::with_capacity(column_count);
    for _ in 0..column_count {
        let name_len = r.u32()? as usize;
        let name = r.utf8(name_len)?;
        let type_tag = r.u8()?;
        let ty = ColumnType::from_tag(type_tag)?;
        columns.push((name, ty));
    }

    for (i, (name, ty)) in columns.iter().enumerate() {
        let exp = &expected.columns[i];
        if name != exp.name || *ty != exp.ty {
            return Err(AxmError::serialization(format!(
                "column {i} mismatch: expected {}({:?}), got {name}({ty:?})",
                exp.name, exp.ty
            )));
        }
    }

    let row_count = r.u64()?;
    if row_count > limits.max_rows {
        return Err(AxmError::limit_exceeded(format!(
            "{} exceeds row limit ({})",
            path.display(),
            limits.max_rows
        )));
    }

    let mut rows = Vec::with_capacity(row_count as usize);
    for _ in 0..row_count {
        let mut row = Vec::with_capacity(column_count);
        for (_, ty) in &columns {
            let presence = r.u8()?;
            if presence == 0 {
                return Err(AxmError::invariant("null cell present in table"));
            }
            let cell = match ty {
                ColumnType::Utf8 => {
                    let len = r.u32()? as usize;
                    CellValue::Utf8(r.utf8(len)?)
                }
                ColumnType::Int64 => CellValue::Int64(r.i64()?),
                ColumnType::Int8 => {
                    let b = r.u8()?;
                    CellValue::Int8(b as i8)
                }
            };
            row.push(cell);
        }
        rows.push(row);
    }

    Ok(rows)
}
