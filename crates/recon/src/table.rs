//! String-valued tables with an explicit "absent" cell marker.
//!
//! Every value is kept as text exactly as read. Coercion to numbers or dates
//! never happens here, so leading zeros and long numeric identifiers survive.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::ReconError;

/// A single cell: `None` is the absent marker, distinct from `Some("")`.
pub type Cell = Option<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Table {
    /// Build a table, rejecting duplicate column names and rows whose width
    /// differs from the header.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, ReconError> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(ReconError::InvalidTable(format!("duplicate column '{name}'")));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ReconError::InvalidTable(format!(
                    "row {i} has {} cells, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self { columns, rows, index })
    }

    /// Convenience for tests and fixtures: every cell present.
    pub fn from_strs(columns: &[&str], rows: &[&[&str]]) -> Result<Self, ReconError> {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| Some(v.to_string())).collect())
                .collect(),
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.columns, self.rows)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Checked lookup: `None` for an unknown column, an out-of-range row or an
    /// absent cell.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Keep only `columns`, in that order.
    pub fn project(&self, columns: &[String]) -> Result<Table, ReconError> {
        let mut indices = Vec::with_capacity(columns.len());
        let mut missing = Vec::new();
        for name in columns {
            match self.column_index(name) {
                Some(i) => indices.push(i),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(ReconError::InvalidTable(format!(
                "cannot project missing column(s): {}",
                missing.join(", ")
            )));
        }

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Table::new(columns.to_vec(), rows)
    }

    /// The first `limit` rows as ordered column → value maps, absent as `""`.
    pub fn to_records(&self, limit: usize) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(name, cell)| {
                        let value = cell.clone().unwrap_or_default();
                        (name.clone(), serde_json::Value::String(value))
                    })
                    .collect()
            })
            .collect()
    }
}

/// Normalize raw header cells into unique column names.
///
/// Blank names become `Unnamed: <position>`. Repeats get `.1`, `.2`, ...
/// appended in order of appearance; the first occurrence keeps its name.
pub fn normalize_headers<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let base: Vec<String> = raw
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.as_ref();
            if h.trim().is_empty() {
                format!("Unnamed: {i}")
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut taken: HashSet<String> = HashSet::with_capacity(base.len());
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(base.len());

    for name in base {
        if taken.insert(name.clone()) {
            out.push(name);
            continue;
        }
        let n = counts.entry(name.clone()).or_insert(0);
        let renamed = loop {
            *n += 1;
            let candidate = format!("{name}.{n}");
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(renamed.clone());
        out.push(renamed);
    }

    out
}

/// Positional names for header-less reads: "0", "1", ...
pub fn positional_headers(width: usize) -> Vec<String> {
    (0..width).map(|i| i.to_string()).collect()
}
