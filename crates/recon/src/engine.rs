use tracing::debug;

use crate::classify::classify;
use crate::error::ReconError;
use crate::keys::JoinSpec;
use crate::matcher::{compared_columns, join_rows, output_columns, render_row};
use crate::model::{DiffRow, DiffSummary, DiffTable, RowClass};
use crate::table::Table;

/// Join `left` and `right` per `spec` and keep only the discrepancies.
///
/// The result holds every one-sided row the join mode retains plus every
/// matched pair whose compared columns disagree. Matched-equal pairs are
/// counted in the summary and left out. Nothing is returned partially: any
/// failure comes back as [`ReconError::ComputationFailed`].
pub fn compute_diff(left: &Table, right: &Table, spec: &JoinSpec) -> Result<DiffTable, ReconError> {
    let left_p = left
        .project(spec.left_columns())
        .map_err(ReconError::computation)?;
    let right_p = right
        .project(spec.right_columns())
        .map_err(ReconError::computation)?;

    let columns = output_columns(spec);
    let compared = compared_columns(spec);
    let joined = join_rows(&left_p, &right_p, spec);

    let mut summary = DiffSummary {
        left_rows: left.row_count(),
        right_rows: right.row_count(),
        ..Default::default()
    };
    let mut rows = Vec::new();

    for j in &joined {
        let l = j.left.map(|i| left_p.rows()[i].as_slice());
        let r = j.right.map(|i| right_p.rows()[i].as_slice());
        let classification = classify(l, r, &compared);

        match classification.class {
            RowClass::MatchedEqual => {
                summary.matched_equal += 1;
                continue;
            }
            RowClass::MatchedWithValueDiff => summary.value_diffs += 1,
            RowClass::LeftOnly => summary.left_only += 1,
            RowClass::RightOnly => summary.right_only += 1,
        }

        rows.push(DiffRow {
            class: classification.class,
            cells: render_row(j, &left_p, &right_p, &columns),
            differing: classification.differing,
        });
    }

    let table = DiffTable {
        columns: columns.into_iter().map(|c| c.name).collect(),
        compared: compared.into_iter().map(|c| c.name).collect(),
        join_mode: spec.join_mode(),
        rows,
        summary,
    };

    // Suffixing can collide with a user column of the same name.
    table.to_table().map_err(ReconError::computation)?;

    debug!(
        mode = %table.join_mode,
        joined = joined.len(),
        diff_rows = table.rows.len(),
        matched_equal = table.summary.matched_equal,
        "diff computed"
    );

    Ok(table)
}
