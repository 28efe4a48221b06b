// Diff artifacts: file naming and the CSV + XLSX pair

use std::path::{Path, PathBuf};

use ecarts_recon::{sanitize, JoinMode, Table};

use crate::error::ExportError;

pub const DEFAULT_CATEGORY: &str = "ECART";
pub const DEFAULT_SHEET_NAME: &str = "Diff";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub xlsx: PathBuf,
}

/// `{CATEGORY}_{MODE}_{run_id}_{uniq}` under `dir`, where `uniq` is eight hex
/// characters of a fresh v4 UUID.
pub fn export_names(dir: &Path, category: Option<&str>, mode: JoinMode, run_id: i64) -> ExportPaths {
    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| c.to_uppercase().replace(' ', "_"))
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    let uniq = uuid::Uuid::new_v4().simple().to_string();
    let stem = format!("{}_{}_{}_{}", category, mode.as_str().to_uppercase(), run_id, &uniq[..8]);

    ExportPaths {
        csv: dir.join(format!("{stem}.csv")),
        xlsx: dir.join(format!("{stem}.xlsx")),
    }
}

/// Sanitize the diff table and write both artifacts, creating `paths`'
/// parent directories as needed.
pub fn write_exports(table: &Table, paths: &ExportPaths, sheet_name: &str) -> Result<(), ExportError> {
    let clean = sanitize(table)?;

    for path in [&paths.csv, &paths.xlsx] {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    crate::csv::write_delimited(&clean, &paths.csv)?;
    crate::xlsx::write_spreadsheet(&clean, &paths.xlsx, sheet_name)?;

    tracing::info!(
        csv = %paths.csv.display(),
        xlsx = %paths.xlsx.display(),
        rows = clean.row_count(),
        "wrote diff exports"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_category_mode_id_pattern() {
        let paths = export_names(Path::new("/out"), Some("stock magasin"), JoinMode::Outer, 42);
        let name = paths.csv.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("STOCK_MAGASIN_OUTER_42_"), "{name}");
        assert!(name.ends_with(".csv"));
        let uniq = name.trim_start_matches("STOCK_MAGASIN_OUTER_42_").trim_end_matches(".csv");
        assert_eq!(uniq.len(), 8);
        assert!(uniq.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(paths.xlsx.with_extension("csv"), paths.csv);
        assert_eq!(paths.csv.parent(), Some(Path::new("/out")));
    }

    #[test]
    fn default_category_when_blank() {
        let a = export_names(Path::new("."), None, JoinMode::Inner, 1);
        let b = export_names(Path::new("."), Some("  "), JoinMode::Inner, 1);
        for p in [a.csv, b.csv] {
            assert!(p.to_str().unwrap().contains("ECART_INNER_1_"));
        }
    }

    #[test]
    fn names_are_unique_per_call() {
        let a = export_names(Path::new("."), None, JoinMode::Left, 7);
        let b = export_names(Path::new("."), None, JoinMode::Left, 7);
        assert_ne!(a.csv, b.csv);
    }
}
