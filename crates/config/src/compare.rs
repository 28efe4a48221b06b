// Comparison configs (TOML)
//
//   name = "commandes"
//   category = "stock magasin"
//   join_mode = "outer"
//
//   [left]
//   label = "Web1"
//   columns = ["Ref", "Qte"]
//   keys = ["Ref"]
//   header_row = 0
//
//   [right]
//   label = "Desktop"
//   columns = ["Reference", "Quantite"]
//   keys = ["Reference"]

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ecarts_recon::{build_spec, JoinMode, JoinSpec, JoinSpecInput, Suffixes};

use crate::error::ConfigError;

/// Column selection for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SideConfig {
    /// Display name of the source system.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub keys: Vec<String>,
    /// 0-based physical row holding the column names.
    #[serde(default)]
    pub header_row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompareConfig {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub join_mode: JoinMode,
    pub left: SideConfig,
    pub right: SideConfig,
}

impl CompareConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e: toml::de::Error| e.to_string())
    }

    /// Build the join spec, catching key-set errors before anything is read.
    pub fn to_join_spec(&self, suffixes: Suffixes) -> Result<JoinSpec, ConfigError> {
        let spec = build_spec(JoinSpecInput {
            left_columns: self.left.columns.clone(),
            right_columns: self.right.columns.clone(),
            left_keys: self.left.keys.clone(),
            right_keys: self.right.keys.clone(),
            join_mode: self.join_mode,
            suffixes,
        })?;
        Ok(spec)
    }

    pub fn left_label(&self) -> &str {
        self.left.label.as_deref().unwrap_or("Web1")
    }

    pub fn right_label(&self) -> &str {
        self.right.label.as_deref().unwrap_or("Desktop")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecarts_recon::{ReconError, Side};

    const SAMPLE: &str = r#"
name = "commandes"
category = "stock magasin"
join_mode = "left"

[left]
label = "Web1"
columns = ["Ref", "Qte"]
keys = ["Ref"]
header_row = 2

[right]
columns = ["Reference", "Quantite"]
keys = ["Reference"]
"#;

    #[test]
    fn parses_full_config() {
        let config = CompareConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.name, "commandes");
        assert_eq!(config.join_mode, JoinMode::Left);
        assert_eq!(config.left.header_row, 2);
        assert_eq!(config.right.header_row, 0);
        assert_eq!(config.left_label(), "Web1");
        assert_eq!(config.right_label(), "Desktop");

        let spec = config.to_join_spec(Suffixes::default()).unwrap();
        assert_eq!(spec.left_keys(), &["Ref"]);
        assert_eq!(spec.join_mode(), JoinMode::Left);
    }

    #[test]
    fn join_mode_defaults_to_outer() {
        let config = CompareConfig::from_toml(
            "name = \"x\"\n[left]\nkeys = [\"a\"]\n[right]\nkeys = [\"b\"]\n",
        )
        .unwrap();
        assert_eq!(config.join_mode, JoinMode::Outer);
        assert_eq!(config.category, None);
    }

    #[test]
    fn rejects_unknown_join_mode_and_fields() {
        let bad_mode = SAMPLE.replace("\"left\"", "\"cross\"");
        assert!(CompareConfig::from_toml(&bad_mode).is_err());

        let typo = SAMPLE.replace("keys = [\"Ref\"]", "key = [\"Ref\"]");
        assert!(CompareConfig::from_toml(&typo).is_err());
    }

    #[test]
    fn key_errors_surface_as_invalid() {
        let mut config = CompareConfig::from_toml(SAMPLE).unwrap();
        config.right.keys = vec!["Reference".into(), "Date".into()];
        let err = config.to_join_spec(Suffixes::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ReconError::KeyCountMismatch { left: 1, right: 2 })
        ));

        config.left.keys.clear();
        let err = config.to_join_spec(Suffixes::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ReconError::EmptyKeySet { side: Side::Left })
        ));
    }
}
