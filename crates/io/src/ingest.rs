// Source reading: file kind dispatch, header selection, NA handling

use std::path::Path;

use ecarts_recon::table::{normalize_headers, positional_headers};
use ecarts_recon::{Cell, Table};

use crate::encoding::{decode_with_candidates, TextEncoding};
use crate::error::IngestError;
use crate::source::FileKind;

/// Default number of bytes inspected when sniffing the separator.
pub const DEFAULT_SNIFF_BYTES: usize = 64_000;

/// Cell texts read as absent when NA handling is on.
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND",
    "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// One physical row as read, before header interpretation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawRow {
    /// 1-based line (delimited text) or row number (spreadsheets).
    pub line: u64,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// 0-based physical row holding column names; `None` for positional
    /// names "0", "1", ...
    pub header_row: Option<usize>,
    /// Cap on data rows read after the header.
    pub max_rows: Option<usize>,
    /// Encodings tried in order for delimited text.
    pub encodings: Vec<TextEncoding>,
    pub sniff_bytes: usize,
    pub na_tokens: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            header_row: Some(0),
            max_rows: None,
            encodings: TextEncoding::DEFAULT_CANDIDATES.to_vec(),
            sniff_bytes: DEFAULT_SNIFF_BYTES,
            na_tokens: true,
        }
    }
}

impl IngestOptions {
    pub fn with_header_row(mut self, row: Option<usize>) -> Self {
        self.header_row = row;
        self
    }

    pub fn with_max_rows(mut self, rows: Option<usize>) -> Self {
        self.max_rows = rows;
        self
    }
}

/// Read a CSV or Excel file into a string-valued table.
pub fn read_table(path: &Path, opts: &IngestOptions) -> Result<Table, IngestError> {
    let rows = read_physical_rows(path, opts)?;
    let kind = FileKind::from_path(path)?;
    let table = build_table(rows, opts, kind == FileKind::Spreadsheet)?;

    tracing::debug!(
        path = %path.display(),
        rows = table.row_count(),
        columns = table.column_count(),
        "read table"
    );
    Ok(table)
}

/// The first `max_rows` physical rows with no header interpretation, absent
/// cells as `""`. Lets a caller pick the header row.
pub fn peek_rows(path: &Path, max_rows: usize, opts: &IngestOptions) -> Result<Vec<Vec<String>>, IngestError> {
    let rows = read_physical_rows(path, opts)?;
    Ok(rows
        .into_iter()
        .take(max_rows)
        .map(|row| {
            row.cells
                .into_iter()
                .map(|cell| na_filter(cell, opts.na_tokens).unwrap_or_default())
                .collect()
        })
        .collect())
}

/// Normalized column names of `header_row` without reading data rows into a
/// table.
pub fn read_headers(path: &Path, header_row: usize, opts: &IngestOptions) -> Result<Vec<String>, IngestError> {
    let rows = read_physical_rows(path, opts)?;
    let header = rows.get(header_row).ok_or(IngestError::HeaderRowOutOfRange {
        row: header_row,
        available: rows.len(),
    })?;
    Ok(header_names(&header.cells))
}

fn read_physical_rows(path: &Path, opts: &IngestOptions) -> Result<Vec<RawRow>, IngestError> {
    if !path.exists() {
        return Err(IngestError::SourceMissing(path.to_path_buf()));
    }

    match FileKind::from_path(path)? {
        FileKind::Delimited => {
            let bytes = std::fs::read(path)?;
            read_delimited_bytes(&bytes, opts)
        }
        FileKind::Spreadsheet => crate::xlsx::read_first_sheet(path),
    }
}

/// Decode and parse delimited text held in memory.
pub(crate) fn read_delimited_bytes(bytes: &[u8], opts: &IngestOptions) -> Result<Vec<RawRow>, IngestError> {
    let sample = &bytes[..bytes.len().min(opts.sniff_bytes)];
    let delimiter = opts
        .encodings
        .iter()
        .find_map(|enc| enc.decode_sample(sample))
        .map(|text| crate::csv::sniff_delimiter(&text))
        .unwrap_or(b',');

    let (content, encoding) = decode_with_candidates(bytes, &opts.encodings)
        .map_err(|tried| IngestError::DecodeError { tried })?;

    tracing::debug!(
        encoding = encoding.label(),
        delimiter = crate::csv::delimiter_name(delimiter),
        "decoded delimited text"
    );

    crate::csv::read_records(&content, delimiter)
}

/// Delimited-table builder for callers holding bytes rather than a path.
pub fn read_delimited_table(bytes: &[u8], opts: &IngestOptions) -> Result<Table, IngestError> {
    let rows = read_delimited_bytes(bytes, opts)?;
    build_table(rows, opts, false)
}

fn header_names(cells: &[Cell]) -> Vec<String> {
    let raw: Vec<&str> = cells.iter().map(|c| c.as_deref().unwrap_or("")).collect();
    normalize_headers(&raw)
}

fn na_filter(cell: Cell, enabled: bool) -> Cell {
    match cell {
        Some(text) if enabled && NA_TOKENS.contains(&text.as_str()) => None,
        other => other,
    }
}

/// Turn physical rows into a table: pick the header, drop rows above it,
/// pad short rows, reject long ones.
fn build_table(rows: Vec<RawRow>, opts: &IngestOptions, skip_empty: bool) -> Result<Table, IngestError> {
    let (columns, data_start) = match opts.header_row {
        Some(h) => {
            let header = rows.get(h).ok_or(IngestError::HeaderRowOutOfRange {
                row: h,
                available: rows.len(),
            })?;
            (header_names(&header.cells), h + 1)
        }
        None => {
            let width = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
            (positional_headers(width), 0)
        }
    };
    let width = columns.len();

    let mut data = Vec::new();
    for row in rows.into_iter().skip(data_start) {
        if opts.max_rows.is_some_and(|max| data.len() >= max) {
            break;
        }

        let RawRow { line, mut cells } = row;
        if cells.len() > width {
            // Trailing empty cells past the header are padding, not data
            let extra_empty = cells[width..]
                .iter()
                .all(|c| c.as_deref().map_or(true, str::is_empty));
            if !skip_empty || !extra_empty {
                return Err(IngestError::RaggedRow { line, expected: width, found: cells.len() });
            }
            cells.truncate(width);
        }
        cells.resize(width, None);

        let cells: Vec<Cell> = cells.into_iter().map(|c| na_filter(c, opts.na_tokens)).collect();
        if skip_empty && cells.iter().all(Option::is_none) {
            continue;
        }
        data.push(cells);
    }

    Ok(Table::new(columns, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn missing_source_is_reported_before_reading() {
        let dir = tempdir().unwrap();
        let err = read_table(&dir.path().join("nope.csv"), &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::SourceMissing(_)));
    }

    #[test]
    fn unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "data.json", b"{}");
        let err = read_table(&path, &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(ext) if ext == "json"));
    }

    #[test]
    fn semicolon_cp1252_file() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "web.csv", b"ref;libell\xE9\n007;caf\xE9\n008;th\xE9\n");
        let table = read_table(&path, &IngestOptions::default()).unwrap();
        assert_eq!(table.columns(), &["ref", "libellé"]);
        assert_eq!(table.get(0, "ref"), Some("007"));
        assert_eq!(table.get(1, "libellé"), Some("thé"));
    }

    #[test]
    fn header_row_offset_skips_preamble() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "desk.csv", b"Export du 01/02\nid,qty\n1,5\n2,\n");
        let opts = IngestOptions::default().with_header_row(Some(1));
        let table = read_table(&path, &opts).unwrap();
        assert_eq!(table.columns(), &["id", "qty"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(1, "qty"), None);
    }

    #[test]
    fn header_row_out_of_range() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "short.csv", b"a,b\n1,2\n");
        let opts = IngestOptions::default().with_header_row(Some(5));
        let err = read_table(&path, &opts).unwrap_err();
        assert!(matches!(err, IngestError::HeaderRowOutOfRange { row: 5, available: 2 }));
    }

    #[test]
    fn short_rows_padded_long_rows_rejected() {
        let opts = IngestOptions::default();
        let table = read_delimited_table(b"a,b,c\n1,2\n", &opts).unwrap();
        assert_eq!(table.rows()[0], vec![Some("1".into()), Some("2".into()), None]);

        let err = read_delimited_table(b"a,b\n1,2\n1,2,3\n", &opts).unwrap_err();
        assert!(matches!(err, IngestError::RaggedRow { line: 3, expected: 2, found: 3 }));
    }

    #[test]
    fn na_tokens_become_absent_unless_disabled() {
        let table = read_delimited_table(b"id,v\n1,NULL\n2,n/a\n3,none\n", &IngestOptions::default()).unwrap();
        assert_eq!(table.get(0, "v"), None);
        assert_eq!(table.get(1, "v"), None);
        assert_eq!(table.get(2, "v"), Some("none"));

        let opts = IngestOptions { na_tokens: false, ..IngestOptions::default() };
        let table = read_delimited_table(b"id,v\n1,NULL\n", &opts).unwrap();
        assert_eq!(table.get(0, "v"), Some("NULL"));
    }

    #[test]
    fn blank_and_duplicate_headers_normalized() {
        let table = read_delimited_table(b"id,,id\n1,2,3\n", &IngestOptions::default()).unwrap();
        assert_eq!(table.columns(), &["id", "Unnamed: 1", "id.1"]);
    }

    #[test]
    fn headerless_read_uses_positions() {
        let opts = IngestOptions::default().with_header_row(None);
        // Width comes from the widest row
        let table = read_delimited_table(b"1,2\n3,4,5\n", &opts).unwrap();
        assert_eq!(table.columns(), &["0", "1", "2"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(0, "2"), None);
        assert_eq!(table.get(1, "2"), Some("5"));
    }

    #[test]
    fn max_rows_caps_data_rows() {
        let opts = IngestOptions::default().with_max_rows(Some(1));
        let table = read_delimited_table(b"a\n1\n2\n3\n", &opts).unwrap();
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn restricted_encodings_can_fail() {
        let opts = IngestOptions { encodings: vec![TextEncoding::Utf8], ..IngestOptions::default() };
        let err = read_delimited_table(b"a\n\xE9\n", &opts).unwrap_err();
        assert!(matches!(err, IngestError::DecodeError { ref tried } if tried == &["utf-8"]));
    }

    #[test]
    fn peek_and_headers() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "p.csv", b"title\nref;qty\n1;NA\n");
        let opts = IngestOptions::default();

        let rows = peek_rows(&path, 2, &opts).unwrap();
        assert_eq!(rows, vec![vec!["title".to_string()], vec!["ref".into(), "qty".into()]]);

        let rows = peek_rows(&path, 10, &opts).unwrap();
        assert_eq!(rows[2], vec!["1".to_string(), String::new()]);

        assert_eq!(read_headers(&path, 1, &opts).unwrap(), vec!["ref", "qty"]);
    }
}
