use std::cmp::Ordering;
use std::collections::HashMap;

use crate::keys::{JoinMode, JoinSpec, Side};
use crate::model::{ColumnSource, ComparedColumn, JoinedRow, OutputColumn};
use crate::table::{Cell, Table};

/// Composite key values of one row. Absent matches absent.
type KeyValues = Vec<Cell>;

/// Join two projected tables on the join spec's composite key.
///
/// Duplicate keys pair every left row with every right row sharing the key.
/// Ordering: `inner`/`left` follow the left table, `right` follows the right
/// table, `outer` is sorted by key (absent last) and stable within a key.
pub fn join_rows(left: &Table, right: &Table, spec: &JoinSpec) -> Vec<JoinedRow> {
    let left_idx = key_indices(left, spec.left_keys());
    let right_idx = key_indices(right, spec.right_keys());
    let mode = spec.join_mode();

    match mode {
        JoinMode::Right => {
            let left_map = index_by_key(left, &left_idx);
            let mut out = Vec::new();
            for (ri, row) in right.rows().iter().enumerate() {
                match left_map.get(&key_of(row, &right_idx)) {
                    Some(lis) => out.extend(lis.iter().map(|&li| JoinedRow {
                        left: Some(li),
                        right: Some(ri),
                    })),
                    None => out.push(JoinedRow { left: None, right: Some(ri) }),
                }
            }
            out
        }
        JoinMode::Inner | JoinMode::Left | JoinMode::Outer => {
            let right_map = index_by_key(right, &right_idx);
            let mut right_used = vec![false; right.row_count()];
            let mut out = Vec::new();

            for (li, row) in left.rows().iter().enumerate() {
                match right_map.get(&key_of(row, &left_idx)) {
                    Some(ris) => {
                        for &ri in ris {
                            right_used[ri] = true;
                            out.push(JoinedRow { left: Some(li), right: Some(ri) });
                        }
                    }
                    None if mode.keeps(Side::Left) => {
                        out.push(JoinedRow { left: Some(li), right: None });
                    }
                    None => {}
                }
            }

            if mode == JoinMode::Outer {
                out.extend(
                    right_used
                        .iter()
                        .enumerate()
                        .filter(|(_, used)| !**used)
                        .map(|(ri, _)| JoinedRow { left: None, right: Some(ri) }),
                );
                out.sort_by(|a, b| {
                    let ka = joined_key(a, left, &left_idx, right, &right_idx);
                    let kb = joined_key(b, left, &left_idx, right, &right_idx);
                    compare_keys(&ka, &kb)
                });
            }
            out
        }
    }
}

/// Output column layout for a diff table.
///
/// Left columns first, then right columns. A key pair sharing one name on both
/// sides is emitted once; any other name present on both sides is suffixed.
pub fn output_columns(spec: &JoinSpec) -> Vec<OutputColumn> {
    let coalesced: Vec<&String> = spec
        .left_keys()
        .iter()
        .zip(spec.right_keys())
        .filter(|(l, r)| l == r)
        .map(|(l, _)| l)
        .collect();
    let is_coalesced = |name: &String| coalesced.contains(&name);

    let left_cols = spec.left_columns();
    let right_cols = spec.right_columns();
    let suffixes = spec.suffixes();
    let mut out = Vec::with_capacity(left_cols.len() + right_cols.len());

    for (li, name) in left_cols.iter().enumerate() {
        if is_coalesced(name) {
            // Both projections contain their keys, so the lookup succeeds.
            if let Some(ri) = right_cols.iter().position(|c| c == name) {
                out.push(OutputColumn {
                    name: name.clone(),
                    source: ColumnSource::Coalesced { left: li, right: ri },
                });
                continue;
            }
        }
        let name = if right_cols.contains(name) {
            format!("{name}{}", suffixes.left)
        } else {
            name.clone()
        };
        out.push(OutputColumn { name, source: ColumnSource::Left(li) });
    }

    for (ri, name) in right_cols.iter().enumerate() {
        if is_coalesced(name) {
            continue;
        }
        let name = if left_cols.contains(name) {
            format!("{name}{}", suffixes.right)
        } else {
            name.clone()
        };
        out.push(OutputColumn { name, source: ColumnSource::Right(ri) });
    }

    out
}

/// Positions of the compared columns inside each projection.
pub fn compared_columns(spec: &JoinSpec) -> Vec<ComparedColumn> {
    spec.compared_columns()
        .into_iter()
        .filter_map(|name| {
            let left = spec.left_columns().iter().position(|c| *c == name)?;
            let right = spec.right_columns().iter().position(|c| *c == name)?;
            Some(ComparedColumn { name, left, right })
        })
        .collect()
}

/// Materialize one output row.
pub fn render_row(
    joined: &JoinedRow,
    left: &Table,
    right: &Table,
    columns: &[OutputColumn],
) -> Vec<Cell> {
    let l = joined.left.map(|i| &left.rows()[i]);
    let r = joined.right.map(|i| &right.rows()[i]);
    let pick = |row: Option<&Vec<Cell>>, i: usize| row.and_then(|cells| cells[i].clone());

    columns
        .iter()
        .map(|col| match col.source {
            ColumnSource::Left(i) => pick(l, i),
            ColumnSource::Right(i) => pick(r, i),
            ColumnSource::Coalesced { left: li, right: ri } => {
                pick(l, li).or_else(|| pick(r, ri))
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn key_indices(table: &Table, keys: &[String]) -> Vec<usize> {
    // Callers project on the join spec first, so every key has a column.
    keys.iter().filter_map(|k| table.column_index(k)).collect()
}

fn key_of(row: &[Cell], indices: &[usize]) -> KeyValues {
    indices.iter().map(|&i| row[i].clone()).collect()
}

fn index_by_key(table: &Table, indices: &[usize]) -> HashMap<KeyValues, Vec<usize>> {
    let mut map: HashMap<KeyValues, Vec<usize>> = HashMap::new();
    for (i, row) in table.rows().iter().enumerate() {
        map.entry(key_of(row, indices)).or_default().push(i);
    }
    map
}

fn joined_key(
    joined: &JoinedRow,
    left: &Table,
    left_idx: &[usize],
    right: &Table,
    right_idx: &[usize],
) -> KeyValues {
    match (joined.left, joined.right) {
        (Some(li), _) => key_of(&left.rows()[li], left_idx),
        (None, Some(ri)) => key_of(&right.rows()[ri], right_idx),
        (None, None) => Vec::new(),
    }
}

/// Lexicographic over key parts; an absent part sorts after any value.
fn compare_keys(a: &[Cell], b: &[Cell]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = match (x, y) {
            (Some(x), Some(y)) => x.cmp(y),
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{build_spec, JoinSpecInput};

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn spec(mode: JoinMode) -> JoinSpec {
        build_spec(JoinSpecInput {
            left_columns: strings(&["id", "name"]),
            right_columns: strings(&["id", "name"]),
            left_keys: strings(&["id"]),
            right_keys: strings(&["id"]),
            join_mode: mode,
            ..Default::default()
        })
        .unwrap()
    }

    fn tables() -> (Table, Table) {
        let left = Table::from_strs(&["id", "name"], &[&["2", "B"], &["1", "A"], &["2", "B2"]]).unwrap();
        let right = Table::from_strs(&["id", "name"], &[&["3", "C"], &["2", "b"]]).unwrap();
        (left, right)
    }

    #[test]
    fn inner_follows_left_order_with_duplicates() {
        let (left, right) = tables();
        let rows = join_rows(&left, &right, &spec(JoinMode::Inner));
        assert_eq!(
            rows,
            vec![
                JoinedRow { left: Some(0), right: Some(1) },
                JoinedRow { left: Some(2), right: Some(1) },
            ]
        );
    }

    #[test]
    fn left_keeps_unmatched_left() {
        let (left, right) = tables();
        let rows = join_rows(&left, &right, &spec(JoinMode::Left));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], JoinedRow { left: Some(1), right: None });
    }

    #[test]
    fn right_follows_right_order() {
        let (left, right) = tables();
        let rows = join_rows(&left, &right, &spec(JoinMode::Right));
        assert_eq!(
            rows,
            vec![
                JoinedRow { left: None, right: Some(0) },
                JoinedRow { left: Some(0), right: Some(1) },
                JoinedRow { left: Some(2), right: Some(1) },
            ]
        );
    }

    #[test]
    fn outer_sorted_by_key() {
        let (left, right) = tables();
        let rows = join_rows(&left, &right, &spec(JoinMode::Outer));
        assert_eq!(
            rows,
            vec![
                JoinedRow { left: Some(1), right: None },
                JoinedRow { left: Some(0), right: Some(1) },
                JoinedRow { left: Some(2), right: Some(1) },
                JoinedRow { left: None, right: Some(0) },
            ]
        );
    }

    #[test]
    fn absent_keys_match_and_sort_last() {
        let left = Table::new(
            vec!["id".into(), "name".into()],
            vec![vec![None, Some("x".into())], vec![Some("9".into()), Some("y".into())]],
        )
        .unwrap();
        let right = Table::new(
            vec!["id".into(), "name".into()],
            vec![vec![None, Some("x".into())]],
        )
        .unwrap();
        let rows = join_rows(&left, &right, &spec(JoinMode::Outer));
        assert_eq!(
            rows,
            vec![
                JoinedRow { left: Some(1), right: None },
                JoinedRow { left: Some(0), right: Some(0) },
            ]
        );
    }

    #[test]
    fn output_columns_coalesce_and_suffix() {
        let spec = build_spec(JoinSpecInput {
            left_columns: strings(&["id", "Ref", "name", "only_l"]),
            right_columns: strings(&["id", "NCDE", "name", "only_r"]),
            left_keys: strings(&["id", "Ref"]),
            right_keys: strings(&["id", "NCDE"]),
            ..Default::default()
        })
        .unwrap();
        let names: Vec<String> = output_columns(&spec).into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            strings(&["id", "Ref", "name_web1", "only_l", "NCDE", "name_desktop", "only_r"])
        );
    }

    #[test]
    fn coalesced_key_takes_right_value_for_right_only() {
        let s = spec(JoinMode::Outer);
        let (left, right) = tables();
        let cols = output_columns(&s);
        let row = render_row(&JoinedRow { left: None, right: Some(0) }, &left, &right, &cols);
        assert_eq!(row, vec![Some("3".into()), None, Some("C".into())]);
    }
}
