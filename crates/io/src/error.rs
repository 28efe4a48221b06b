use std::path::PathBuf;

use thiserror::Error;

use ecarts_recon::ReconError;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The declared source does not exist at read time.
    #[error("source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// Extension outside csv / xls / xlsx.
    #[error("unsupported file extension '{0}' (expected .csv, .xls or .xlsx)")]
    UnsupportedFormat(String),

    /// No candidate encoding decoded the bytes.
    #[error("could not decode text (tried: {})", .tried.join(", "))]
    DecodeError { tried: Vec<&'static str> },

    #[error("header row {row} is past the end of the data ({available} row(s) read)")]
    HeaderRowOutOfRange { row: usize, available: usize },

    #[error("line {line}: expected {expected} field(s), found {found}")]
    RaggedRow { line: u64, expected: usize, found: usize },

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Table(#[from] ReconError),
}

impl From<calamine::Error> for IngestError {
    fn from(e: calamine::Error) -> Self {
        Self::Spreadsheet(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("table too large for a worksheet: {rows} row(s) x {columns} column(s)")]
    TooLarge { rows: usize, columns: usize },

    #[error(transparent)]
    Table(#[from] ReconError),
}
