use thiserror::Error;

use crate::keys::Side;

#[derive(Debug, Error)]
pub enum ReconError {
    /// Selected columns that do not exist in the side's headers.
    #[error("invalid columns on {side} side: {}", quoted(.columns))]
    InvalidColumns { side: Side, columns: Vec<String> },

    /// Composite keys must pair up position by position.
    #[error("key count mismatch: {left} left key(s) vs {right} right key(s)")]
    KeyCountMismatch { left: usize, right: usize },

    /// At least one key column is required per side.
    #[error("no join key selected on {side} side")]
    EmptyKeySet { side: Side },

    /// Table construction rejected its input (ragged row, duplicate header).
    #[error("invalid table: {0}")]
    InvalidTable(String),

    /// Unexpected failure while projecting, joining or comparing.
    #[error("diff computation failed: {source}")]
    ComputationFailed {
        #[source]
        source: Box<ReconError>,
    },
}

impl ReconError {
    pub(crate) fn computation(source: ReconError) -> Self {
        Self::ComputationFailed {
            source: Box::new(source),
        }
    }

    /// True for errors a caller can fix by editing the comparison setup.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidColumns { .. } | Self::KeyCountMismatch { .. } | Self::EmptyKeySet { .. }
        )
    }
}

fn quoted(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("'{c}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_columns_lists_every_name() {
        let err = ReconError::InvalidColumns {
            side: Side::Left,
            columns: vec!["Ref".into(), "Date".into()],
        };
        assert_eq!(err.to_string(), "invalid columns on left side: 'Ref', 'Date'");
        assert!(err.is_config_error());
    }

    #[test]
    fn computation_failed_keeps_source() {
        let err = ReconError::computation(ReconError::InvalidTable("row 3 has 2 cells".into()));
        assert!(err.to_string().contains("row 3 has 2 cells"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_config_error());
    }
}
