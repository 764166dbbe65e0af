//! Column-ordered, row-sparse tables.
//!
//! A row only holds the cells it actually has; a column missing from a row
//! reads as null. The table keeps the union of column names in first-seen
//! order so snapshots have a stable header.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};

use crate::model::value::Scalar;

/// One sparse row: column name → non-null value.
pub type Row = IndexMap<String, Scalar>;

static NULL: Scalar = Scalar::Null;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: IndexSet<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty table with a fixed header.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> impl ExactSizeIterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Add a column to the header without touching rows.
    pub fn add_column(&mut self, column: impl Into<String>) {
        self.columns.insert(column.into());
    }

    /// Append a row. Null cells are dropped; unseen columns extend the header.
    pub fn push(&mut self, row: Row) {
        let mut sparse = Row::with_capacity(row.len());
        for (column, value) in row {
            if !self.columns.contains(&column) {
                self.columns.insert(column.clone());
            }
            if !value.is_null() {
                sparse.insert(column, value);
            }
        }
        self.rows.push(sparse);
    }

    /// Append every row of `other`, keeping its column order after ours.
    pub fn append(&mut self, other: Table) {
        for column in other.columns {
            self.columns.insert(column);
        }
        self.rows.extend(other.rows);
    }

    pub fn cell(&self, row: usize, column: &str) -> &Scalar {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    /// Values of one column, nulls included.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Scalar> + 'a {
        self.rows.iter().map(move |r| r.get(column).unwrap_or(&NULL))
    }

    /// Keep the first row per distinct value of `key`. Returns rows removed.
    ///
    /// Rows with a null key are treated as sharing one key.
    pub fn dedup_by(&mut self, key: &str) -> usize {
        let mut seen: HashSet<Option<String>> = HashSet::with_capacity(self.rows.len());
        let before = self.rows.len();
        self.rows
            .retain(|row| seen.insert(row.get(key).and_then(Scalar::key_repr)));
        before - self.rows.len()
    }

    /// Remove columns that are null in every row. Returns the dropped names.
    pub fn drop_empty_columns(&mut self) -> Vec<String> {
        let populated: HashSet<&String> = self.rows.iter().flat_map(|r| r.keys()).collect();
        let empty: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !populated.contains(c))
            .cloned()
            .collect();
        for column in &empty {
            self.columns.shift_remove(column);
        }
        empty
    }

    /// Rename a column in the header and in every row, keeping positions.
    ///
    /// No-op when `from` does not exist or `to` already does.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        let Some(index) = self.columns.get_index_of(from) else {
            return false;
        };
        if self.columns.contains(to) {
            return false;
        }
        self.columns.shift_remove_index(index);
        let (last, _) = self.columns.insert_full(to.to_string());
        self.columns.move_index(last, index);

        for row in &mut self.rows {
            let Some(position) = row.get_index_of(from) else {
                continue;
            };
            if let Some((_, value)) = row.shift_remove_index(position) {
                let (last, _) = row.insert_full(to.to_string(), value);
                row.move_index(last, position);
            }
        }
        true
    }

    /// Left join on `on`. Right-hand columns that collide with ours get
    /// `prefix` prepended. A left row with several matches yields several rows.
    pub fn left_join(&self, right: &Table, on: &str, prefix: &str) -> Table {
        let rename = |column: &str| -> String {
            if column != on && self.columns.contains(column) {
                format!("{prefix}{column}")
            } else {
                column.to_string()
            }
        };

        let mut index: IndexMap<String, Vec<&Row>> = IndexMap::new();
        for row in &right.rows {
            if let Some(key) = row.get(on).and_then(Scalar::key_repr) {
                index.entry(key).or_default().push(row);
            }
        }

        let mut joined = Table::with_columns(self.columns.iter().cloned());
        for column in right.columns.iter().filter(|c| c.as_str() != on) {
            joined.add_column(rename(column));
        }

        for left in &self.rows {
            let matches = left
                .get(on)
                .and_then(Scalar::key_repr)
                .and_then(|key| index.get(&key));
            match matches {
                Some(matches) => {
                    for right_row in matches {
                        let mut row = left.clone();
                        for (column, value) in right_row.iter().filter(|(c, _)| c.as_str() != on) {
                            row.insert(rename(column), value.clone());
                        }
                        joined.rows.push(row);
                    }
                }
                None => joined.rows.push(left.clone()),
            }
        }
        joined
    }
}

impl FromIterator<Row> for Table {
    fn from_iter<T: IntoIterator<Item = Row>>(iter: T) -> Self {
        let mut table = Table::new();
        for row in iter {
            table.push(row);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, Scalar)]) -> Row {
        cells
            .iter()
            .map(|(c, v)| (c.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_push_tracks_sparse_columns() {
        let mut table = Table::with_columns(["spanID"]);
        table.push(row(&[("spanID", "a".into()), ("tag_x", Scalar::Int(1))]));
        table.push(row(&[("spanID", "b".into()), ("tag_y", Scalar::Null)]));

        assert_eq!(table.columns().collect::<Vec<_>>(), ["spanID", "tag_x", "tag_y"]);
        assert_eq!(table.cell(1, "tag_x"), &Scalar::Null);
        assert!(!table.rows()[1].contains_key("tag_y"));
    }

    #[test]
    fn test_dedup_keeps_first() {
        let mut table: Table = vec![
            row(&[("spanID", "a".into()), ("v", Scalar::Int(1))]),
            row(&[("spanID", "b".into()), ("v", Scalar::Int(2))]),
            row(&[("spanID", "a".into()), ("v", Scalar::Int(3))]),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.dedup_by("spanID"), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, "v"), &Scalar::Int(1));
    }

    #[test]
    fn test_drop_empty_columns() {
        let mut table = Table::with_columns(["spanID", "tag_unused"]);
        table.push(row(&[("spanID", "a".into())]));
        assert_eq!(table.drop_empty_columns(), vec!["tag_unused".to_string()]);
        assert_eq!(table.columns().collect::<Vec<_>>(), ["spanID"]);
    }

    #[test]
    fn test_rename_keeps_position() {
        let mut table: Table = vec![row(&[
            ("level", "info".into()),
            ("span_id", "a".into()),
            ("message", "hi".into()),
        ])]
        .into_iter()
        .collect();

        assert!(table.rename_column("span_id", "spanID"));
        assert_eq!(table.columns().collect::<Vec<_>>(), ["level", "spanID", "message"]);
        assert_eq!(table.rows()[0].keys().nth(1).map(String::as_str), Some("spanID"));
        assert!(!table.rename_column("missing", "other"));
    }

    #[test]
    fn test_left_join_prefixes_collisions() {
        let spans: Table = vec![
            row(&[("spanID", "a".into()), ("duration", Scalar::Int(5))]),
            row(&[("spanID", "b".into()), ("duration", Scalar::Int(6))]),
        ]
        .into_iter()
        .collect();
        let logs: Table = vec![
            row(&[("spanID", "a".into()), ("message", "one".into()), ("duration", Scalar::Int(1))]),
            row(&[("spanID", "a".into()), ("message", "two".into())]),
        ]
        .into_iter()
        .collect();

        let joined = spans.left_join(&logs, "spanID", "log_");
        assert_eq!(
            joined.columns().collect::<Vec<_>>(),
            ["spanID", "duration", "message", "log_duration"]
        );
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.cell(0, "log_duration"), &Scalar::Int(1));
        assert_eq!(joined.cell(1, "message"), &Scalar::Text("two".into()));
        assert_eq!(joined.cell(2, "message"), &Scalar::Null);
    }
}
