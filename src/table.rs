use std::collections::{HashMap, HashSet};

/// A single survey response: a sparse map of column name to text cell.
/// A cell is considered missing when the column is absent or the trimmed
/// value is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, String>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(column.into(), value.into());
    }

    pub fn remove(&mut self, column: &str) {
        self.cells.remove(column);
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(|s| s.as_str())
    }

    pub fn is_missing(&self, column: &str) -> bool {
        match self.cells.get(column) {
            Some(value) => value.trim().is_empty(),
            None => true,
        }
    }

    fn column_names(&self) -> Vec<&String> {
        self.cells.keys().collect()
    }
}

/// An ordered sequence of rows sharing an ordered column union. The schema
/// may be ragged: a row holds cells only for the columns it has values for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for column in columns {
            table.add_column(&column.into());
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Append a column to the union; no-op when already present.
    pub fn add_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Push a row, extending the column union with any columns the table has
    /// not seen yet. Novel columns are appended in sorted order so the union
    /// stays deterministic regardless of the row's internal map order.
    pub fn push_row(&mut self, row: Row) {
        let mut novel: Vec<&String> = row
            .column_names()
            .into_iter()
            .filter(|c| !self.has_column(c))
            .collect();
        if !novel.is_empty() {
            novel.sort();
            let novel: Vec<String> = novel.into_iter().cloned().collect();
            for column in novel {
                self.columns.push(column);
            }
        }
        self.rows.push(row);
    }

    /// Concatenate another table onto this one. The column union grows
    /// monotonically: columns keep first-seen order and none are dropped.
    pub fn append(&mut self, other: Table) {
        for column in &other.columns {
            self.add_column(column);
        }
        self.rows.extend(other.rows);
    }

    /// Set `value` on every row, adding the column if necessary.
    pub fn set_column(&mut self, column: &str, value: &str) {
        self.add_column(column);
        for row in &mut self.rows {
            row.set(column, value);
        }
    }

    /// Rewrite every present cell of a column through `f`. Cells mapped to
    /// the empty string are removed, keeping the absent-as-null model.
    /// Missing cells stay missing.
    pub fn map_column(&mut self, column: &str, f: impl Fn(&str) -> String) {
        if !self.has_column(column) {
            return;
        }
        for row in &mut self.rows {
            let mapped = row.get(column).map(|value| f(value));
            match mapped {
                Some(value) if value.is_empty() => row.remove(column),
                Some(value) => row.set(column, value),
                None => {}
            }
        }
    }

    /// Derive a new column from an existing one. `f` receives the source
    /// cell (None when missing) and returns the derived value; `None` or an
    /// empty string leaves the destination cell missing.
    pub fn derive_column(
        &mut self,
        source: &str,
        destination: &str,
        f: impl Fn(Option<&str>) -> Option<String>,
    ) {
        self.add_column(destination);
        for row in &mut self.rows {
            let derived = f(row.get(source));
            match derived {
                Some(value) if !value.is_empty() => row.set(destination, value),
                _ => row.remove(destination),
            }
        }
    }

    /// Split rows into (matching, rest), both keeping the full column union.
    pub fn partition(self, pred: impl Fn(&Row) -> bool) -> (Table, Table) {
        let mut matching = Table {
            columns: self.columns.clone(),
            rows: Vec::new(),
        };
        let mut rest = Table {
            columns: self.columns,
            rows: Vec::new(),
        };
        for row in self.rows {
            if pred(&row) {
                matching.rows.push(row);
            } else {
                rest.rows.push(row);
            }
        }
        (matching, rest)
    }

    /// Build a table with the same columns containing clones of the rows at
    /// `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Remove exact duplicate rows, keeping the first occurrence.
    /// Returns the number of rows removed.
    pub fn dedup_exact(&mut self) -> usize {
        let columns = self.columns.clone();
        let mut seen = HashSet::new();
        let before = self.rows.len();
        self.rows
            .retain(|row| seen.insert(fingerprint(&columns, row)));
        before - self.rows.len()
    }

    /// Remove rows duplicating an earlier row's cell in `column`, keeping
    /// the first occurrence. Rows missing the cell are treated as sharing
    /// one duplicate key. Returns the number of rows removed.
    pub fn dedup_by_column(&mut self, column: &str) -> usize {
        let mut seen = HashSet::new();
        let before = self.rows.len();
        self.rows
            .retain(|row| seen.insert(row.get(column).unwrap_or("\u{0}").to_string()));
        before - self.rows.len()
    }
}

/// Canonical row identity over the table's column order: present and missing
/// cells are encoded distinctly so ragged rows compare correctly.
fn fingerprint(columns: &[String], row: &Row) -> String {
    let mut key = String::new();
    for column in columns {
        match row.get(column) {
            Some(value) => {
                key.push('\u{1}');
                key.push_str(value);
            }
            None => key.push('\u{2}'),
        }
        key.push('\u{1f}');
    }
    key
}
