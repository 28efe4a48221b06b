// Excel import (first sheet, cells as text) and export (single named sheet)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};

use ecarts_recon::Table;

use crate::error::{ExportError, IngestError};
use crate::ingest::RawRow;

/// Spreadsheet format limits.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// Read the first worksheet as physical rows.
///
/// Row and column positions are absolute: when the used range starts below
/// row 1 or right of column A, the leading rows and columns are filled with
/// absent cells so a header row index means the same thing as in the file.
pub(crate) fn read_first_sheet(path: &Path) -> Result<Vec<RawRow>, IngestError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Err(IngestError::Spreadsheet("workbook contains no sheets".into())),
    };

    let Some((start_row, start_col)) = range.start() else {
        return Ok(Vec::new());
    };
    let (start_row, start_col) = (start_row as usize, start_col as usize);
    let width = start_col + range.width();

    let mut rows: Vec<RawRow> = (0..start_row)
        .map(|r| RawRow { line: r as u64 + 1, cells: vec![None; width] })
        .collect();

    for (i, data_row) in range.rows().enumerate() {
        let mut cells: Vec<Option<String>> = vec![None; start_col];
        cells.extend(data_row.iter().map(render_cell));
        rows.push(RawRow { line: (start_row + i) as u64 + 1, cells });
    }

    Ok(rows)
}

/// Render a cell as the text a user would see, never coercing identifiers.
fn render_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                Some(format!("{}", *n as i64))
            } else {
                Some(format!("{}", n))
            }
        }
        Data::Int(n) => Some(n.to_string()),
        Data::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => Some(e.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => Some(value.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Some(dt.as_f64().to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Write a table to a single worksheet: bold header row, frozen below it,
/// every present cell written as a string.
pub fn write_spreadsheet(table: &Table, path: &Path, sheet_name: &str) -> Result<(), ExportError> {
    if table.row_count() + 1 > MAX_ROWS || table.column_count() > MAX_COLS {
        return Err(ExportError::TooLarge {
            rows: table.row_count(),
            columns: table.column_count(),
        });
    }

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (col, name) in table.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name.as_str(), &header)?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        let row32 = (r + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            if let Some(value) = cell.as_deref() {
                if !value.is_empty() {
                    worksheet.write_string(row32, col as u16, value)?;
                }
            }
        }
    }
    worksheet.set_freeze_panes(1, 0)?;

    workbook.save(path)?;
    Ok(())
}
