use std::fmt;

use serde::Serialize;

use crate::error::ReconError;
use crate::keys::JoinMode;
use crate::table::{Cell, Table};

/// Name of the bookkeeping column carrying each row's provenance.
pub const MERGE_COLUMN: &str = "_merge";

// ---------------------------------------------------------------------------
// Join output
// ---------------------------------------------------------------------------

/// Row indices of one join result: a pair, or a row with no counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinedRow {
    pub left: Option<usize>,
    pub right: Option<usize>,
}

/// Where an output column takes its value from, as indices into the
/// projected left/right tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    Left(usize),
    Right(usize),
    /// Key present under the same name on both sides, emitted once.
    Coalesced { left: usize, right: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub source: ColumnSource,
}

/// A same-named non-key column compared across sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparedColumn {
    pub name: String,
    pub left: usize,
    pub right: usize,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    LeftOnly,
    RightOnly,
    Both,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::LeftOnly => "left_only",
            Provenance::RightOnly => "right_only",
            Provenance::Both => "both",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowClass {
    LeftOnly,
    RightOnly,
    MatchedEqual,
    MatchedWithValueDiff,
}

impl RowClass {
    pub fn provenance(&self) -> Provenance {
        match self {
            RowClass::LeftOnly => Provenance::LeftOnly,
            RowClass::RightOnly => Provenance::RightOnly,
            RowClass::MatchedEqual | RowClass::MatchedWithValueDiff => Provenance::Both,
        }
    }

    /// Everything except confirmed agreement is a discrepancy.
    pub fn is_discrepancy(&self) -> bool {
        !matches!(self, RowClass::MatchedEqual)
    }
}

impl fmt::Display for RowClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowClass::LeftOnly => write!(f, "left_only"),
            RowClass::RightOnly => write!(f, "right_only"),
            RowClass::MatchedEqual => write!(f, "matched_equal"),
            RowClass::MatchedWithValueDiff => write!(f, "matched_with_value_diff"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub class: RowClass,
    /// Compared columns whose values differ (empty unless `MatchedWithValueDiff`).
    pub differing: Vec<String>,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRow {
    pub class: RowClass,
    pub cells: Vec<Cell>,
    pub differing: Vec<String>,
}

impl DiffRow {
    pub fn provenance(&self) -> Provenance {
        self.class.provenance()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub left_rows: usize,
    pub right_rows: usize,
    pub matched_equal: usize,
    pub value_diffs: usize,
    pub left_only: usize,
    pub right_only: usize,
}

impl DiffSummary {
    pub fn total_input_rows(&self) -> usize {
        self.left_rows + self.right_rows
    }

    pub fn discrepancies(&self) -> usize {
        self.value_diffs + self.left_only + self.right_only
    }
}

/// Rows that differ or exist on one side only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffTable {
    pub columns: Vec<String>,
    pub compared: Vec<String>,
    pub join_mode: JoinMode,
    pub rows: Vec<DiffRow>,
    pub summary: DiffSummary,
}

impl DiffTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.cells.get(col)?.as_deref()
    }

    /// Flatten into a plain table with the provenance column appended last.
    pub fn to_table(&self) -> Result<Table, ReconError> {
        let mut columns = self.columns.clone();
        columns.push(MERGE_COLUMN.to_string());

        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut cells = r.cells.clone();
                cells.push(Some(r.provenance().as_str().to_string()));
                cells
            })
            .collect();

        Table::new(columns, rows)
    }
}
