use crate::model::{Classification, ComparedColumn, RowClass};
use crate::table::Cell;

/// Classify one join result.
///
/// Compared values are equal when their text is equal; an absent cell reads
/// as the empty string, so absent vs. non-empty is a difference.
pub fn classify(
    left: Option<&[Cell]>,
    right: Option<&[Cell]>,
    compared: &[ComparedColumn],
) -> Classification {
    match (left, right) {
        (Some(l), Some(r)) => {
            let differing: Vec<String> = compared
                .iter()
                .filter(|c| text(&l[c.left]) != text(&r[c.right]))
                .map(|c| c.name.clone())
                .collect();
            let class = if differing.is_empty() {
                RowClass::MatchedEqual
            } else {
                RowClass::MatchedWithValueDiff
            };
            Classification { class, differing }
        }
        (Some(_), None) => Classification {
            class: RowClass::LeftOnly,
            differing: Vec::new(),
        },
        // A join never yields a row with neither side.
        (None, _) => Classification {
            class: RowClass::RightOnly,
            differing: Vec::new(),
        },
    }
}

fn text(cell: &Cell) -> &str {
    cell.as_deref().unwrap_or("")
}
