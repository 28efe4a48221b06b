// File I/O: source ingestion (CSV, Excel) and diff exports

pub mod csv;
pub mod encoding;
pub mod error;
pub mod export;
pub mod ingest;
pub mod source;
pub mod xlsx;

pub use encoding::TextEncoding;
pub use error::{ExportError, IngestError};
pub use export::{export_names, write_exports, ExportPaths};
pub use ingest::{peek_rows, read_headers, read_table, IngestOptions};
pub use source::{infer_store_from_filename, FileKind};
