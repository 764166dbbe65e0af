//! Row-oriented snapshots.
//!
//! Cells are written with [`Scalar`]'s `Display`; nulls are empty fields.
//! Reading types each column by [`RecordKind::column_hint`] so identifiers
//! that look numeric stay text.

use std::path::Path;

use crate::error::PersistenceError;
use crate::model::{parse_timestamp, ColumnHint, RecordKind, Row, Scalar, Table};

pub fn write_table(path: &Path, table: &Table) -> Result<(), PersistenceError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| PersistenceError::csv(path, e))?;

    writer
        .write_record(table.columns())
        .map_err(|e| PersistenceError::csv(path, e))?;
    for index in 0..table.len() {
        let record: Vec<String> = table
            .columns()
            .map(|column| table.cell(index, column).to_string())
            .collect();
        writer
            .write_record(&record)
            .map_err(|e| PersistenceError::csv(path, e))?;
    }
    writer.flush().map_err(|e| PersistenceError::io(path, e))
}

pub fn read_table(path: &Path, kind: RecordKind) -> Result<Table, PersistenceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PersistenceError::csv(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PersistenceError::csv(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let hints: Vec<ColumnHint> = headers.iter().map(|h| kind.column_hint(h)).collect();

    let mut table = Table::with_columns(headers.iter().cloned());
    for record in reader.records() {
        let record = record.map_err(|e| PersistenceError::csv(path, e))?;
        let row: Row = headers
            .iter()
            .zip(&hints)
            .zip(record.iter())
            .map(|((column, hint), raw)| (column.clone(), typed_cell(raw, *hint)))
            .collect();
        table.push(row);
    }
    Ok(table)
}

fn typed_cell(raw: &str, hint: ColumnHint) -> Scalar {
    if raw.is_empty() {
        return Scalar::Null;
    }
    match hint {
        ColumnHint::Text => Scalar::Text(raw.to_string()),
        ColumnHint::Timestamp => parse_timestamp(raw)
            .map(Scalar::Timestamp)
            .unwrap_or_else(|| Scalar::Text(raw.to_string())),
        ColumnHint::Infer => Scalar::infer(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use indexmap::indexmap;
    use tempfile::TempDir;

    fn sample() -> Table {
        let mut table = Table::with_columns(RecordKind::Spans.fixed_columns().iter().copied());
        table.push(indexmap! {
            "spanID".to_string() => Scalar::from("0042"),
            "traceID".to_string() => Scalar::from("t1"),
            "startTime".to_string() => Scalar::from(Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()),
            "duration".to_string() => Scalar::Int(1500),
            "tag_ratio".to_string() => Scalar::Float(2.0),
            "tag_ok".to_string() => Scalar::Bool(true),
        });
        table.push(indexmap! {
            "spanID".to_string() => Scalar::from("b"),
            "tag_note".to_string() => Scalar::from("a, \"quoted\" note"),
        });
        table
    }

    #[test]
    fn test_round_trip_keeps_types_and_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spans.csv");
        let table = sample();

        write_table(&path, &table).unwrap();
        let loaded = read_table(&path, RecordKind::Spans).unwrap();

        assert_eq!(loaded, table);
        // numeric-looking identifiers stay text
        assert_eq!(loaded.cell(0, "spanID"), &Scalar::from("0042"));
    }

    #[test]
    fn test_header_only_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.csv");
        let table = Table::with_columns(RecordKind::Logs.fixed_columns().iter().copied());

        write_table(&path, &table).unwrap();
        let loaded = read_table(&path, RecordKind::Logs).unwrap();

        assert!(loaded.is_empty());
        assert_eq!(loaded.columns().collect::<Vec<_>>(), vec!["level", "message", "time"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = read_table(&dir.path().join("absent.csv"), RecordKind::Logs).unwrap_err();
        assert!(matches!(err, PersistenceError::Csv { .. }));
    }
}
