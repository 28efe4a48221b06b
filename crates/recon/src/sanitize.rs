//! Make a diff table safe for CSV and spreadsheet writers.

use std::borrow::Cow;

use crate::error::ReconError;
use crate::model::MERGE_COLUMN;
use crate::table::Table;

/// Control characters spreadsheet XML cannot carry: U+0000-U+0008, U+000B,
/// U+000C and U+000E-U+001F. Tab, LF and CR are kept.
pub fn is_illegal(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}')
}

pub fn strip_illegal(s: &str) -> Cow<'_, str> {
    if s.chars().any(is_illegal) {
        Cow::Owned(s.chars().filter(|c| !is_illegal(*c)).collect())
    } else {
        Cow::Borrowed(s)
    }
}

/// Drop the provenance column, turn absent cells into `""` and strip illegal
/// control characters from names and values.
///
/// Names are not re-deduplicated after stripping; when two collapse onto the
/// same name the later column wins.
pub fn sanitize(table: &Table) -> Result<Table, ReconError> {
    let mut keep: Vec<(usize, String)> = Vec::with_capacity(table.column_count());
    for (i, name) in table.columns().iter().enumerate() {
        if name == MERGE_COLUMN {
            continue;
        }
        let clean = strip_illegal(name).into_owned();
        match keep.iter().position(|(_, n)| *n == clean) {
            Some(pos) => keep[pos].0 = i,
            None => keep.push((i, clean)),
        }
    }

    let rows = table
        .rows()
        .iter()
        .map(|row| {
            keep.iter()
                .map(|(i, _)| {
                    let value = row[*i].as_deref().unwrap_or("");
                    Some(strip_illegal(value).into_owned())
                })
                .collect()
        })
        .collect();

    Table::new(keep.into_iter().map(|(_, n)| n).collect(), rows)
}
