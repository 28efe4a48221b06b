use thiserror::Error;

use crate::model::{RunId, RunStatus};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("preview payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("run {0} not found")]
    NotFound(RunId),

    /// Terminal runs are immutable; only `running` may transition.
    #[error("run {id} is already {status}")]
    IllegalTransition { id: RunId, status: RunStatus },
}
