// One comparison run: validate, ingest, diff, export, record
//
// Configuration and header problems are reported before a run exists.
// Once the run is started every failure is recorded on it, so the ledger
// never keeps a run in `running` state.

use std::path::{Path, PathBuf};

use thiserror::Error;

use ecarts_config::{CompareConfig, ConfigError, Settings};
use ecarts_io::{
    export_names, infer_store_from_filename, read_headers, read_table, write_exports, ExportError,
    IngestError, IngestOptions,
};
use ecarts_ledger::{
    ExportLocations, LedgerError, LedgerStore, Run, RunId, RunInputs, RunOutcome, DEFAULT_PREVIEW_LIMIT,
};
use ecarts_recon::{compute_diff, JoinSpec, ReconError, Side};

/// Everything needed to run one comparison.
#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub config: CompareConfig,
    /// Identity recorded on the run (config name or path).
    pub config_ref: String,
    pub left: PathBuf,
    pub right: PathBuf,
    /// Override of the config's header row, 0-based.
    pub left_header_row: Option<usize>,
    pub right_header_row: Option<usize>,
}

impl CompareRequest {
    pub fn new(config: CompareConfig, left: PathBuf, right: PathBuf) -> Self {
        Self {
            config_ref: config.name.clone(),
            config,
            left,
            right,
            left_header_row: None,
            right_header_row: None,
        }
    }

    fn header_row(&self, side: Side) -> usize {
        match side {
            Side::Left => self.left_header_row.unwrap_or(self.config.left.header_row),
            Side::Right => self.right_header_row.unwrap_or(self.config.right.header_row),
        }
    }

    fn path(&self, side: Side) -> &Path {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

/// Errors that prevent a run from being created, or from being recorded.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{side} source: {source}")]
    Ingest {
        side: Side,
        #[source]
        source: IngestError,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Failures inside the run boundary. Recorded as the run's message.
#[derive(Debug, Error)]
enum RunFailure {
    #[error("{side} source: {source}")]
    Ingest { side: Side, source: IngestError },

    #[error(transparent)]
    Diff(#[from] ReconError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

fn ingest_options(settings: &Settings, header_row: usize) -> IngestOptions {
    IngestOptions {
        sniff_bytes: settings.sniff_bytes,
        na_tokens: settings.na_tokens,
        ..IngestOptions::default()
    }
    .with_header_row(Some(header_row))
}

/// Check the config and both sources' headers without creating a run.
pub fn prepare(request: &CompareRequest, settings: &Settings) -> Result<JoinSpec, PipelineError> {
    let spec = request.config.to_join_spec(settings.suffixes())?;

    let headers = |side: Side| {
        let row = request.header_row(side);
        read_headers(request.path(side), row, &ingest_options(settings, row))
            .map_err(|source| PipelineError::Ingest { side, source })
    };
    let left = headers(Side::Left)?;
    let right = headers(Side::Right)?;

    spec.validate_against(&left, &right).map_err(ConfigError::from)?;
    Ok(spec)
}

/// Run a comparison end to end.
///
/// Returns the run in its terminal state: `success` with counts and export
/// paths, or `failed` with the diagnostic message. Only configuration and
/// header errors (before the run exists) and ledger errors are returned as
/// `Err`.
pub fn run_comparison(
    request: &CompareRequest,
    settings: &Settings,
    ledger: &mut LedgerStore,
) -> Result<Run, PipelineError> {
    let spec = prepare(request, settings)?;

    let store = infer_store_from_filename(&request.left).or_else(|| infer_store_from_filename(&request.right));
    let mut run = ledger.start(&RunInputs {
        config_ref: request.config_ref.clone(),
        category: request.config.category.clone(),
        left_ref: request.left.display().to_string(),
        right_ref: request.right.display().to_string(),
        store,
    })?;

    match execute(request, &spec, settings, run.id) {
        Ok(outcome) => {
            let exports = outcome.exports.clone();
            if let Err(err) = ledger.complete(&mut run, outcome) {
                // The run must not stay `running`; its exports are orphans
                remove_exports(&exports);
                if let Err(fail_err) = ledger.fail(&mut run, &format!("recording result failed: {err}")) {
                    tracing::error!(run = run.id.0, error = %fail_err, "cannot mark run failed");
                }
                return Err(err.into());
            }
        }
        Err(failure) => ledger.fail(&mut run, &failure.to_string())?,
    }
    Ok(run)
}

fn remove_exports(exports: &ExportLocations) {
    for path in [&exports.csv, &exports.xlsx].into_iter().flatten() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path, error = %e, "cannot remove export");
        }
    }
}

/// Preview rows kept per run: the configured limit, never more than the
/// ledger's bound.
fn preview_limit(settings: &Settings) -> usize {
    settings.preview_limit.min(DEFAULT_PREVIEW_LIMIT)
}

fn execute(
    request: &CompareRequest,
    spec: &JoinSpec,
    settings: &Settings,
    run_id: RunId,
) -> Result<RunOutcome, RunFailure> {
    let read = |side: Side| {
        let row = request.header_row(side);
        read_table(request.path(side), &ingest_options(settings, row))
            .map_err(|source| RunFailure::Ingest { side, source })
    };
    let left = read(Side::Left)?;
    let right = read(Side::Right)?;

    let diff = compute_diff(&left, &right, spec)?;
    let table = diff.to_table()?;
    let preview = table.to_records(preview_limit(settings));

    let paths = export_names(
        &settings.exports_dir(),
        request.config.category.as_deref(),
        spec.join_mode(),
        run_id.0,
    );
    write_exports(&table, &paths, &settings.sheet_name)?;

    tracing::info!(
        run = run_id.0,
        left = request.config.left_label(),
        right = request.config.right_label(),
        left_only = diff.summary.left_only,
        right_only = diff.summary.right_only,
        value_diffs = diff.summary.value_diffs,
        matched_equal = diff.summary.matched_equal,
        "comparison finished"
    );

    Ok(RunOutcome {
        total_rows: (left.row_count() + right.row_count()) as u64,
        diff_rows: diff.len() as u64,
        exports: ExportLocations {
            csv: Some(paths.csv.display().to_string()),
            xlsx: Some(paths.xlsx.display().to_string()),
        },
        preview,
    })
}
