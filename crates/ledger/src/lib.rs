//! `ecarts-ledger`: durable record of comparison runs.
//!
//! A run is created `running` and moves exactly once to `success` or
//! `failed`. Successful runs carry a bounded preview of their diff rows,
//! stored apart from the run row so listings stay cheap.

pub mod error;
pub mod model;
pub mod store;

pub use error::LedgerError;
pub use model::{
    ExportLocations, LedgerStats, PreviewRow, Run, RunFilter, RunId, RunInputs, RunOutcome, RunStatus,
};
pub use store::LedgerStore;

/// Diff rows kept in a run's stored preview.
pub const DEFAULT_PREVIEW_LIMIT: usize = 10_000;
