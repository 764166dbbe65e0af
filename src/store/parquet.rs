//! Columnar snapshots.
//!
//! # Design Decisions
//! - Column types are inferred per snapshot from the cells present
//! - Integers mixed with floats widen to Float64; any other mix is Utf8
//! - Columns with no values at all are written as nullable Utf8
//! - Timestamps are microsecond precision, UTC

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{
    DataType, Field, Float64Type, Int64Type, Schema, TimeUnit, TimestampMicrosecondType,
};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::PersistenceError;
use crate::model::{Row, Scalar, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Boolean,
    Int,
    Float,
    Timestamp,
    Text,
}

impl ColumnType {
    fn of(value: &Scalar) -> Option<Self> {
        match value {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(Self::Boolean),
            Scalar::Int(_) => Some(Self::Int),
            Scalar::Float(_) => Some(Self::Float),
            Scalar::Timestamp(_) => Some(Self::Timestamp),
            Scalar::Text(_) => Some(Self::Text),
        }
    }

    fn infer<'a>(values: impl Iterator<Item = &'a Scalar>) -> Self {
        let mut seen = None;
        for ty in values.filter_map(Self::of) {
            seen = Some(match (seen, ty) {
                (None, ty) => ty,
                (Some(a), b) if a == b => a,
                (Some(Self::Int), Self::Float) | (Some(Self::Float), Self::Int) => Self::Float,
                _ => return Self::Text,
            });
        }
        seen.unwrap_or(Self::Text)
    }

    fn data_type(&self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean,
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            Self::Text => DataType::Utf8,
        }
    }
}

fn build_array(table: &Table, column: &str, ty: ColumnType) -> ArrayRef {
    let values = table.column_values(column);
    match ty {
        ColumnType::Boolean => Arc::new(
            values
                .map(|v| match v {
                    Scalar::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        ColumnType::Int => Arc::new(
            values
                .map(|v| match v {
                    Scalar::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        ColumnType::Float => Arc::new(
            values
                .map(|v| match v {
                    Scalar::Int(i) => Some(*i as f64),
                    Scalar::Float(x) => Some(*x),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnType::Timestamp => Arc::new(
            values
                .map(|v| match v {
                    Scalar::Timestamp(ts) => Some(ts.timestamp_micros()),
                    _ => None,
                })
                .collect::<TimestampMicrosecondArray>()
                .with_timezone("UTC"),
        ),
        ColumnType::Text => Arc::new(
            values
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect::<StringArray>(),
        ),
    }
}

/// Convert a table into a single record batch.
pub fn to_record_batch(table: &Table) -> Result<RecordBatch, ArrowError> {
    let mut fields = Vec::new();
    let mut arrays = Vec::new();
    for column in table.columns() {
        let ty = ColumnType::infer(table.column_values(column));
        fields.push(Field::new(column, ty.data_type(), true));
        arrays.push(build_array(table, column, ty));
    }
    let options = RecordBatchOptions::new().with_row_count(Some(table.len()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
}

pub fn write_table(path: &Path, table: &Table) -> Result<(), PersistenceError> {
    let batch = to_record_batch(table)?;
    let file = File::create(path).map_err(|e| PersistenceError::io(path, e))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    if batch.num_rows() > 0 {
        writer.write(&batch)?;
    }
    writer.close()?;
    Ok(())
}

pub fn read_table(path: &Path) -> Result<Table, PersistenceError> {
    let file = File::open(path).map_err(|e| PersistenceError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut table = Table::with_columns(schema.fields().iter().map(|f| f.name().clone()));
    for batch in reader {
        let batch = batch?;
        for index in 0..batch.num_rows() {
            let mut row = Row::with_capacity(batch.num_columns());
            for (field, array) in schema.fields().iter().zip(batch.columns()) {
                row.insert(field.name().clone(), scalar_at(array, index)?);
            }
            table.push(row);
        }
    }
    Ok(table)
}

fn scalar_at(array: &ArrayRef, index: usize) -> Result<Scalar, ArrowError> {
    if array.is_null(index) {
        return Ok(Scalar::Null);
    }
    let value = match array.data_type() {
        DataType::Boolean => Scalar::Bool(array.as_boolean().value(index)),
        DataType::Int64 => Scalar::Int(array.as_primitive::<Int64Type>().value(index)),
        DataType::Float64 => Scalar::Float(array.as_primitive::<Float64Type>().value(index)),
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let micros = array.as_primitive::<TimestampMicrosecondType>().value(index);
            chrono::DateTime::from_timestamp_micros(micros)
                .map(Scalar::Timestamp)
                .unwrap_or(Scalar::Null)
        }
        DataType::Utf8 => Scalar::Text(array.as_string::<i32>().value(index).to_string()),
        // written by something else: keep the rendered value
        _ => Scalar::Text(array_value_to_string(array.as_ref(), index)?),
    };
    Ok(value)
}
