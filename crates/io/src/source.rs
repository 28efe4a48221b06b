// Source file classification and file-name conventions

use std::path::Path;

use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.csv`, separator sniffed.
    Delimited,
    /// `.xlsx` / `.xls`, first worksheet.
    Spreadsheet,
}

impl FileKind {
    /// Classify by extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(FileKind::Delimited),
            "xlsx" | "xls" => Ok(FileKind::Spreadsheet),
            _ => Err(IngestError::UnsupportedFormat(ext)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Delimited => "csv",
            FileKind::Spreadsheet => "excel",
        }
    }
}

const STORE_MARKER: &str = "xsupplierorder";

/// Store code from supplier-order export names such as
/// `0421_xsupplierorder_2024.csv`: the digits before the marker.
pub fn infer_store_from_filename(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let (prefix, _) = name.split_once(STORE_MARKER)?;
    let code: String = prefix.chars().filter(char::is_ascii_digit).collect();
    (!code.is_empty()).then_some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_by_extension() {
        assert_eq!(FileKind::from_path(Path::new("a.CSV")).unwrap(), FileKind::Delimited);
        assert_eq!(FileKind::from_path(Path::new("a.xlsx")).unwrap(), FileKind::Spreadsheet);
        assert_eq!(FileKind::from_path(Path::new("dir/a.Xls")).unwrap(), FileKind::Spreadsheet);
        assert!(matches!(
            FileKind::from_path(Path::new("noext")),
            Err(IngestError::UnsupportedFormat(e)) if e.is_empty()
        ));
    }

    #[test]
    fn store_code_from_name() {
        assert_eq!(
            infer_store_from_filename(Path::new("/tmp/0421_xsupplierorder_2024.csv")).as_deref(),
            Some("0421")
        );
        assert_eq!(infer_store_from_filename(Path::new("mag-12-xsupplierorder.xlsx")).as_deref(), Some("12"));
        assert_eq!(infer_store_from_filename(Path::new("xsupplierorder.csv")), None);
        assert_eq!(infer_store_from_filename(Path::new("0421_orders.csv")), None);
    }
}
