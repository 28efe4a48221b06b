//! `ecarts-recon`: reconciliation engine for two tabular extracts.
//!
//! Pure engine crate: receives already-parsed tables and a join spec, returns
//! the discrepancy table. No file or database access.

pub mod classify;
pub mod engine;
pub mod error;
pub mod keys;
pub mod matcher;
pub mod model;
pub mod sanitize;
pub mod table;

pub use engine::compute_diff;
pub use error::ReconError;
pub use keys::{build_spec, validate, JoinMode, JoinSpec, JoinSpecInput, Side, Suffixes};
pub use model::{DiffRow, DiffSummary, DiffTable, Provenance, RowClass, MERGE_COLUMN};
pub use sanitize::sanitize;
pub use table::{Cell, Table};
