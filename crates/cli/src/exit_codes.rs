//! CLI Exit Code Registry
//!
//! Single source of truth for `ecarts` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success (for `compare`: the run succeeded)                     |
//! | 1    | The run was recorded as failed, or an unspecified error        |
//! | 2    | Usage error (bad arguments)                                    |
//! | 3    | Comparison config or settings invalid; no run was created      |
//! | 4    | Source file missing, unsupported or unreadable before the run  |
//! | 5    | Run ledger unavailable or the run id is unknown                |
//!
//! Adding a code: add the constant, document its trigger, update the table.

use ecarts_cli::PipelineError;

/// Success.
pub const EXIT_SUCCESS: u8 = 0;

/// The comparison ran and its run is `failed`.
pub const EXIT_RUN_FAILED: u8 = 1;

/// Usage error - bad arguments, out-of-range options.
pub const EXIT_USAGE: u8 = 2;

/// Config file unreadable or invalid (bad TOML, unknown columns, key errors).
pub const EXIT_CONFIG: u8 = 3;

/// Source problem detected before a run was created.
pub const EXIT_SOURCE: u8 = 4;

/// Ledger database error or unknown run id.
pub const EXIT_LEDGER: u8 = 5;

pub fn pipeline_exit_code(err: &PipelineError) -> u8 {
    match err {
        PipelineError::Config(_) => EXIT_CONFIG,
        PipelineError::Ingest { .. } => EXIT_SOURCE,
        PipelineError::Ledger(_) => EXIT_LEDGER,
    }
}
