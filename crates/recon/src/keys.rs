//! Join-key model: validated column selections and composite keys.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Sides + modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    Inner,
    Left,
    Right,
    #[default]
    Outer,
}

impl JoinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinMode::Inner => "inner",
            JoinMode::Left => "left",
            JoinMode::Right => "right",
            JoinMode::Outer => "outer",
        }
    }

    /// Whether unmatched rows from `side` are kept.
    pub fn keeps(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (JoinMode::Outer, _) | (JoinMode::Left, Side::Left) | (JoinMode::Right, Side::Right)
        )
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinMode::Inner),
            "left" => Ok(JoinMode::Left),
            "right" => Ok(JoinMode::Right),
            "outer" => Ok(JoinMode::Outer),
            other => Err(format!(
                "unknown join mode '{other}' (expected inner, left, right or outer)"
            )),
        }
    }
}

/// Suffixes appended to same-named columns so both sides stay visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suffixes {
    pub left: String,
    pub right: String,
}

impl Default for Suffixes {
    fn default() -> Self {
        Self {
            left: "_web1".into(),
            right: "_desktop".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Spec
// ---------------------------------------------------------------------------

/// Raw selections as a user makes them, before normalization.
#[derive(Debug, Clone, Default)]
pub struct JoinSpecInput {
    pub left_columns: Vec<String>,
    pub right_columns: Vec<String>,
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    pub join_mode: JoinMode,
    pub suffixes: Suffixes,
}

/// A validated composite-key join between two tables.
///
/// `left_keys[i]` pairs with `right_keys[i]`. Each projection always contains
/// its side's keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinSpec {
    left_keys: Vec<String>,
    right_keys: Vec<String>,
    left_columns: Vec<String>,
    right_columns: Vec<String>,
    join_mode: JoinMode,
    suffixes: Suffixes,
}

impl JoinSpec {
    pub fn left_keys(&self) -> &[String] {
        &self.left_keys
    }

    pub fn right_keys(&self) -> &[String] {
        &self.right_keys
    }

    pub fn left_columns(&self) -> &[String] {
        &self.left_columns
    }

    pub fn right_columns(&self) -> &[String] {
        &self.right_columns
    }

    pub fn join_mode(&self) -> JoinMode {
        self.join_mode
    }

    pub fn suffixes(&self) -> &Suffixes {
        &self.suffixes
    }

    pub fn keys(&self, side: Side) -> &[String] {
        match side {
            Side::Left => &self.left_keys,
            Side::Right => &self.right_keys,
        }
    }

    pub fn columns(&self, side: Side) -> &[String] {
        match side {
            Side::Left => &self.left_columns,
            Side::Right => &self.right_columns,
        }
    }

    /// Check both projections against the headers actually read.
    pub fn validate_against(
        &self,
        left_headers: &[String],
        right_headers: &[String],
    ) -> Result<(), ReconError> {
        validate(Side::Left, &self.left_columns, left_headers)?;
        validate(Side::Right, &self.right_columns, right_headers)
    }

    /// Non-key column names retained on both sides, in left projection order.
    pub fn compared_columns(&self) -> Vec<String> {
        let left_keys: HashSet<&str> = self.left_keys.iter().map(String::as_str).collect();
        let right_keys: HashSet<&str> = self.right_keys.iter().map(String::as_str).collect();
        let right: HashSet<&str> = self
            .right_columns
            .iter()
            .map(String::as_str)
            .filter(|c| !right_keys.contains(c))
            .collect();

        self.left_columns
            .iter()
            .filter(|c| !left_keys.contains(c.as_str()) && right.contains(c.as_str()))
            .cloned()
            .collect()
    }
}

/// Fail with every selected column absent from `available`, in input order.
pub fn validate(side: Side, selected: &[String], available: &[String]) -> Result<(), ReconError> {
    let available: HashSet<&str> = available.iter().map(String::as_str).collect();
    let missing: Vec<String> = selected
        .iter()
        .filter(|c| !available.contains(c.as_str()))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReconError::InvalidColumns { side, columns: missing })
    }
}

/// Normalize user selections into a [`JoinSpec`].
pub fn build_spec(input: JoinSpecInput) -> Result<JoinSpec, ReconError> {
    if input.left_keys.is_empty() {
        return Err(ReconError::EmptyKeySet { side: Side::Left });
    }
    if input.right_keys.is_empty() {
        return Err(ReconError::EmptyKeySet { side: Side::Right });
    }
    if input.left_keys.len() != input.right_keys.len() {
        return Err(ReconError::KeyCountMismatch {
            left: input.left_keys.len(),
            right: input.right_keys.len(),
        });
    }

    let left_columns = dedup(input.left_columns.iter().chain(&input.left_keys));
    let right_columns = dedup(input.right_columns.iter().chain(&input.right_keys));

    Ok(JoinSpec {
        left_keys: input.left_keys,
        right_keys: input.right_keys,
        left_columns,
        right_columns,
        join_mode: input.join_mode,
        suffixes: input.suffixes,
    })
}

/// Drop repeats, keeping first-seen order.
pub fn dedup<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}
