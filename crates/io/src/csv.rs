// Delimited text: separator sniffing, record reading, CSV export

use std::path::Path;

use ecarts_recon::Table;

use crate::error::{ExportError, IngestError};
use crate::ingest::RawRow;

/// Candidate separators in tie-break priority order.
const CANDIDATES: [u8; 4] = [b'\t', b';', b',', b'|'];

/// Pick the field separator from a text sample.
///
/// Counts each candidate outside double-quoted fields over the whole sample;
/// the highest count wins and ties go to the earlier candidate (tab,
/// semicolon, comma, pipe). A sample with none of them is treated as
/// comma-separated.
pub fn sniff_delimiter(sample: &str) -> u8 {
    let mut counts = [0usize; CANDIDATES.len()];
    let mut in_quotes = false;

    // An escaped quote ("") toggles twice and leaves the state unchanged
    for b in sample.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            if let Some(i) = CANDIDATES.iter().position(|&c| c == b) {
                counts[i] += 1;
            }
        }
    }

    let mut best = b',';
    let mut best_count = 0usize;
    for (&delim, &count) in CANDIDATES.iter().zip(&counts) {
        if count > best_count {
            best_count = count;
            best = delim;
        }
    }
    best
}

pub fn delimiter_name(delim: u8) -> &'static str {
    match delim {
        b'\t' => "tab",
        b';' => "semicolon",
        b',' => "comma",
        b'|' => "pipe",
        _ => "other",
    }
}

/// Parse decoded text into physical records. Blank lines are skipped by the
/// reader; every other record keeps the 1-based line it starts on.
pub(crate) fn read_records(content: &str, delimiter: u8) -> Result<Vec<RawRow>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    // csv's own line counter ignores skipped blank lines, so count newlines
    // up to each record's first byte instead. The recorded position sits
    // before any blank lines and terminators the reader skipped.
    let bytes = content.as_bytes();
    let mut scanned = 0usize;
    let mut line = 1u64;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut start = record
            .position()
            .map(|p| (p.byte() as usize).clamp(scanned, bytes.len()))
            .unwrap_or(scanned);
        while start < bytes.len() && matches!(bytes[start], b'\r' | b'\n') {
            start += 1;
        }
        if start > scanned {
            line += bytes[scanned..start].iter().filter(|&&b| b == b'\n').count() as u64;
            scanned = start;
        }
        let cells = record.iter().map(|field| Some(field.to_string())).collect();
        rows.push(RawRow { line, cells });
    }
    Ok(rows)
}

/// Write a table as comma-separated UTF-8: header row first, absent cells
/// empty.
///
/// When any value holds another candidate separator, every field is quoted
/// so a later sniff of the file still finds the comma.
pub fn write_delimited(table: &Table, path: &Path) -> Result<(), ExportError> {
    let quote_style = if holds_other_separator(table) {
        csv::QuoteStyle::Always
    } else {
        csv::QuoteStyle::Necessary
    };
    let mut writer = csv::WriterBuilder::new()
        .quote_style(quote_style)
        .from_path(path)?;

    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }

    writer.flush()?;
    Ok(())
}

fn holds_other_separator(table: &Table) -> bool {
    let other = |text: &str| text.bytes().any(|b| b != b',' && CANDIDATES.contains(&b));
    table.columns().iter().any(|name| other(name))
        || table.rows().iter().flatten().flatten().any(|cell| other(cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn sniff_picks_most_frequent() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3\n"), b',');
        assert_eq!(sniff_delimiter("a\tb\n1\t2\n"), b'\t');
        assert_eq!(sniff_delimiter("a|b|c\n"), b'|');
    }

    #[test]
    fn sniff_counts_over_whole_sample() {
        // Decimal commas inside a semicolon file
        assert_eq!(sniff_delimiter("id;price\n1;2,5\n2;3,5\n3;4,5\n"), b';');
        // Three commas on the last line outweigh two semicolons
        assert_eq!(sniff_delimiter("a;b\n1;2\nx,y,z,w\n"), b',');
    }

    #[test]
    fn sniff_ignores_quoted_separators() {
        let sample = "\"id\",\"note\"\n\"1\",\"a;b;c;d;e\"\n\"2\",\"x\ty\tz\"\n";
        assert_eq!(sniff_delimiter(sample), b',');
        assert_eq!(sniff_delimiter("id|note\n1|\"say \"\"hi\"\";;;\"\n"), b'|');
    }

    #[test]
    fn sniff_ties_follow_priority() {
        assert_eq!(sniff_delimiter("a;b,c"), b';');
        assert_eq!(sniff_delimiter("a\tb;c"), b'\t');
        assert_eq!(sniff_delimiter("a,b|c"), b',');
    }

    #[test]
    fn sniff_defaults_to_comma() {
        assert_eq!(sniff_delimiter(""), b',');
        assert_eq!(sniff_delimiter("single column\nvalue\n"), b',');
    }

    #[test]
    fn reader_skips_blank_lines_and_keeps_line_numbers() {
        let rows = read_records("id;name\n\n1;Alice\n2;\"Bob; Jr\"\n", b';').unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line, 1);
        assert_eq!(rows[1].line, 3);
        assert_eq!(rows[2].cells[1].as_deref(), Some("Bob; Jr"));
        assert_eq!(rows[2].line, 4);
    }

    #[test]
    fn line_numbers_count_crlf_blank_lines_and_quoted_newlines() {
        let text = "id,note\r\n\r\n\r\n1,\"two\nlines\"\r\n2,x\r\n";
        let rows = read_records(text, b',').unwrap();
        let lines: Vec<u64> = rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![1, 4, 6]);
    }

    #[test]
    fn reader_keeps_text_verbatim() {
        let rows = read_records("ref,amount\n007,1e3\n", b',').unwrap();
        assert_eq!(rows[1].cells[0].as_deref(), Some("007"));
        assert_eq!(rows[1].cells[1].as_deref(), Some("1e3"));
    }

    #[test]
    fn write_delimited_quotes_and_blanks_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table::new(
            vec!["id".into(), "note".into()],
            vec![
                vec![Some("1".into()), Some("a, b".into())],
                vec![Some("2".into()), None],
            ],
        )
        .unwrap();

        write_delimited(&table, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "id,note\n1,\"a, b\"\n2,\n");
    }

    #[test]
    fn write_delimited_quotes_everything_around_other_separators() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table::new(
            vec!["id".into(), "note".into()],
            vec![vec![Some("1".into()), Some("a;b".into())]],
        )
        .unwrap();

        write_delimited(&table, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "\"id\",\"note\"\n\"1\",\"a;b\"\n");
        assert_eq!(sniff_delimiter(&content), b',');
    }
}
