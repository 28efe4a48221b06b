// Application settings
// Loaded from ~/.config/ecarts/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Exports
    /// Directory for diff artifacts. `None` = `<data dir>/ecarts/exports`.
    #[serde(rename = "exports.dir")]
    pub exports_dir: Option<PathBuf>,

    #[serde(rename = "exports.sheetName")]
    pub sheet_name: String,

    // Ledger
    /// SQLite file. `None` = `<data dir>/ecarts/ledger.db`.
    #[serde(rename = "ledger.path")]
    pub ledger_path: Option<PathBuf>,

    #[serde(rename = "preview.limit")]
    pub preview_limit: usize,

    // Ingestion
    #[serde(rename = "ingest.sniffBytes")]
    pub sniff_bytes: usize,

    #[serde(rename = "ingest.naTokens")]
    pub na_tokens: bool,

    // Join
    #[serde(rename = "join.leftSuffix")]
    pub left_suffix: String,

    #[serde(rename = "join.rightSuffix")]
    pub right_suffix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exports_dir: None,
            sheet_name: "Diff".to_string(),
            ledger_path: None,
            preview_limit: 10_000,
            sniff_bytes: 64_000,
            na_tokens: true,
            left_suffix: "_web1".to_string(),
            right_suffix: "_desktop".to_string(),
        }
    }
}

const DEFAULT_FILE: &str = r#"{
    // Diff exports (null = platform data directory)
    "exports.dir": null,
    "exports.sheetName": "Diff",

    // Run ledger database (null = platform data directory)
    "ledger.path": null,

    // Diff rows kept in each run's stored preview
    "preview.limit": 10000,

    // Bytes inspected when guessing the CSV separator
    "ingest.sniffBytes": 64000,
    // Read "NA", "NULL", "n/a", ... as empty cells
    "ingest.naTokens": true,

    // Suffixes for same-named columns present on both sides
    "join.leftSuffix": "_web1",
    "join.rightSuffix": "_desktop"
}
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ecarts");
        config_dir.join("settings.json")
    }

    fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ecarts")
    }

    /// Load settings from the default location, writing a commented default
    /// file on first use. Unreadable or invalid files fall back to defaults.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            Self::create_default_file(&path);
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "using default settings");
                Self::default()
            }
        }
    }

    /// Load settings from an explicit file. Lines starting with `//` are
    /// comments; missing keys take their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        // Strip comments (lines starting with //)
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    fn create_default_file(path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!(error = %e, "cannot create config directory");
                return;
            }
        }
        if let Err(e) = fs::write(path, DEFAULT_FILE) {
            tracing::warn!(error = %e, "cannot write default settings.json");
        }
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.exports_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("exports"))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("ledger.db"))
    }

    pub fn suffixes(&self) -> ecarts_recon::Suffixes {
        ecarts_recon::Suffixes {
            left: self.left_suffix.clone(),
            right: self.right_suffix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_parses_to_defaults() {
        assert_eq!(Settings::parse(DEFAULT_FILE).unwrap(), Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::parse(
            r#"{
                // only the sheet
                "exports.sheetName": "Ecarts",
                "preview.limit": 50
            }"#,
        )
        .unwrap();
        assert_eq!(settings.sheet_name, "Ecarts");
        assert_eq!(settings.preview_limit, 50);
        assert_eq!(settings.left_suffix, "_web1");
        assert_eq!(settings.sniff_bytes, 64_000);
    }

    #[test]
    fn load_from_reports_path_on_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("settings.json"));

        let err = Settings::load_from(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn explicit_paths_override_data_dir() {
        let settings = Settings {
            exports_dir: Some(PathBuf::from("/srv/exports")),
            ledger_path: Some(PathBuf::from("/srv/ledger.db")),
            ..Settings::default()
        };
        assert_eq!(settings.exports_dir(), PathBuf::from("/srv/exports"));
        assert_eq!(settings.ledger_path(), PathBuf::from("/srv/ledger.db"));
        assert!(Settings::default().ledger_path().ends_with("ecarts/ledger.db"));
    }
}
