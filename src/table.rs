// 📋 Table Model - Ordered columns, optional string cells
// Spreadsheet exports and generated decision tables share this shape.
//
// Cells are Option<String>: an empty CSV field loads as None, the same way a
// missing value is written back out as an empty field.

use crate::error::{Error, Result};
use crate::schema::SchemaValidator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

pub type Row = Vec<Option<String>>;

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with the given header
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builder pattern: append a row of present values
    pub fn with_row<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_row(values.into_iter().map(|v| Some(v.into())).collect());
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
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

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row, padding short rows with missing cells. Cells beyond the
    /// last column are cut off; returns how many of them held a value.
    pub fn push_row(&mut self, mut row: Row) -> usize {
        let dropped = row
            .get(self.columns.len()..)
            .map(|extra| extra.iter().filter(|c| c.is_some()).count())
            .unwrap_or(0);
        row.resize(self.columns.len(), None);
        self.rows.push(row);
        dropped
    }

    /// Cell value by row index and column name (None when missing or absent)
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Set a cell; the column must already exist
    pub fn set(&mut self, row: usize, column: &str, value: Option<String>) {
        if let Some(col) = self.column_index(column) {
            if let Some(cells) = self.rows.get_mut(row) {
                cells[col] = value;
            }
        }
    }

    /// Add a column filled with missing cells, returning its index.
    /// Existing columns are reused as-is.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(None);
        }
        self.columns.len() - 1
    }

    /// All values of one column, in row order
    pub fn column_values(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[col].as_deref()).collect())
    }

    /// Project onto `columns` (in that order). Missing columns are a schema error.
    pub fn select(&self, columns: &[&str], context: &str) -> Result<Table> {
        SchemaValidator::require_columns(self, columns, context)?;

        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();

        Ok(Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// New table keeping only rows for which `keep` returns true
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&Table, usize) -> bool,
    {
        let rows = (0..self.rows.len())
            .filter(|&i| keep(self, i))
            .map(|i| self.rows[i].clone())
            .collect();

        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Copy of rows at the given indices, in that order
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    // ========================================================================
    // CSV I/O
    // ========================================================================

    /// Load a table from CSV with a header row
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Table> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut table = Table::new(columns);

        for result in rdr.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let row = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect();
            let dropped = table.push_row(row);
            if dropped > 0 {
                tracing::warn!(
                    line,
                    dropped,
                    "CSV row has more fields than the header, extra values lost"
                );
            }
        }

        Ok(table)
    }

    pub fn from_csv_path(path: &Path) -> Result<Table> {
        let file = std::fs::File::open(path)?;
        Table::from_csv_reader(file)
    }

    /// Write the table as CSV (missing cells become empty fields)
    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.to_csv_writer(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::Config(format!("non UTF-8 CSV output: {e}")))
    }

    // ========================================================================
    // JOIN
    // ========================================================================

    /// Full outer join on `keys`.
    ///
    /// Non-key columns present on both sides get `suffixes.0` / `suffixes.1`.
    /// Rows with any missing key cell never join and are kept on their own.
    /// A key shared by several rows on both sides yields every pairing.
    pub fn outer_join(
        &self,
        other: &Table,
        keys: &[&str],
        suffixes: (&str, &str),
    ) -> Result<Table> {
        SchemaValidator::require_columns(self, keys, "left join input")?;
        SchemaValidator::require_columns(other, keys, "right join input")?;

        let key_set: HashSet<&str> = keys.iter().copied().collect();
        let left_keys: Vec<usize> = keys.iter().filter_map(|k| self.column_index(k)).collect();
        let right_keys: Vec<usize> = keys.iter().filter_map(|k| other.column_index(k)).collect();

        let left_rest: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !key_set.contains(self.columns[i].as_str()))
            .collect();
        let right_rest: Vec<usize> = (0..other.columns.len())
            .filter(|&i| !key_set.contains(other.columns[i].as_str()))
            .collect();

        let overlap: HashSet<&str> = left_rest
            .iter()
            .map(|&i| self.columns[i].as_str())
            .filter(|c| right_rest.iter().any(|&j| other.columns[j] == *c))
            .collect();

        let mut columns: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        for &i in &left_rest {
            let name = &self.columns[i];
            if overlap.contains(name.as_str()) {
                columns.push(format!("{}{}", name, suffixes.0));
            } else {
                columns.push(name.clone());
            }
        }
        for &j in &right_rest {
            let name = &other.columns[j];
            if overlap.contains(name.as_str()) {
                columns.push(format!("{}{}", name, suffixes.1));
            } else {
                columns.push(name.clone());
            }
        }

        let key_of = |row: &Row, idx: &[usize]| -> Option<Vec<String>> {
            idx.iter().map(|&i| row[i].clone()).collect()
        };

        let mut joined = Table::new(columns);
        let mut right_used = vec![false; other.rows.len()];

        for left in &self.rows {
            let left_key = key_of(left, &left_keys);
            let mut matched_any = false;

            if let Some(ref lk) = left_key {
                for (j, right) in other.rows.iter().enumerate() {
                    if key_of(right, &right_keys).as_ref() == Some(lk) {
                        matched_any = true;
                        right_used[j] = true;
                        let right = Some((right, right_rest.as_slice()));
                        joined.push_row(combine(left, &left_keys, &left_rest, right));
                    }
                }
            }

            if !matched_any {
                joined.push_row(combine(left, &left_keys, &left_rest, None));
            }
        }

        for (j, right) in other.rows.iter().enumerate() {
            if right_used[j] {
                continue;
            }
            let mut row: Row = right_keys.iter().map(|&i| right[i].clone()).collect();
            row.extend(std::iter::repeat(None).take(left_rest.len()));
            row.extend(right_rest.iter().map(|&i| right[i].clone()));
            joined.push_row(row);
        }

        Ok(joined)
    }
}

fn combine(
    left: &Row,
    left_keys: &[usize],
    left_rest: &[usize],
    right: Option<(&Row, &[usize])>,
) -> Row {
    let mut row: Row = left_keys.iter().map(|&i| left[i].clone()).collect();
    row.extend(left_rest.iter().map(|&i| left[i].clone()));
    if let Some((r, rest)) = right {
        row.extend(rest.iter().map(|&i| r[i].clone()));
    }
    row
}

// ============================================================================
// TESTS
// ============================================================================
