// ecarts CLI - reconcile Web1 / Desktop extracts and browse past runs

mod exit_codes;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ecarts_cli::suggest::{suggest, Suggestions};
use ecarts_cli::{prepare, run_comparison, CompareRequest, PipelineError};
use ecarts_config::{CompareConfig, ConfigError, Settings};
use ecarts_io::{infer_store_from_filename, peek_rows, read_headers, IngestError, IngestOptions};
use ecarts_ledger::{LedgerError, LedgerStore, Run, RunFilter, RunId, RunStatus};

use exit_codes::{
    pipeline_exit_code, EXIT_CONFIG, EXIT_LEDGER, EXIT_RUN_FAILED, EXIT_SOURCE, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "ecarts")]
#[command(about = "Reconcile two tabular extracts of the same business data")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/ecarts/settings.json)
    #[arg(long, global = true, env = "ECARTS_SETTINGS", value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Run ledger database (overrides ledger.path from settings)
    #[arg(long, global = true, env = "ECARTS_LEDGER", value_name = "PATH")]
    ledger: Option<PathBuf>,

    /// More logging on stderr (-v info, -vv debug). ECARTS_LOG overrides.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two extracts with a comparison config and record the run
    #[command(after_help = "\
Examples:
  ecarts compare commandes.toml --left web1.csv --right desktop.xlsx
  ecarts compare commandes.toml --left web1.csv --right desktop.xlsx --right-header-line 3
  ecarts compare commandes.toml --left web1.csv --right desktop.csv --json

Exit codes:
  0 run succeeded, 1 run failed (recorded), 3 config invalid, 4 source unreadable")]
    Compare {
        /// Comparison config (TOML)
        config: PathBuf,

        /// Web1 extract (.csv, .xls, .xlsx)
        #[arg(long)]
        left: PathBuf,

        /// Desktop extract (.csv, .xls, .xlsx)
        #[arg(long)]
        right: PathBuf,

        /// 1-based line holding the left column names (overrides the config)
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        left_header_line: Option<u64>,

        /// 1-based line holding the right column names (overrides the config)
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        right_header_line: Option<u64>,

        /// Print the run as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the first rows of a file as read, to locate the header line
    #[command(after_help = "\
Examples:
  ecarts peek desktop.xlsx
  ecarts peek web1.csv --rows 5 --json")]
    Peek {
        file: PathBuf,

        #[arg(long, default_value_t = 10)]
        rows: usize,

        #[arg(long)]
        json: bool,
    },

    /// List the column names of a file, with date and store column guesses
    Headers {
        file: PathBuf,

        /// 1-based line holding the column names
        #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        header_line: u64,

        #[arg(long)]
        json: bool,
    },

    /// Check a comparison config, and optionally its columns against two files
    #[command(after_help = "\
Examples:
  ecarts validate commandes.toml
  ecarts validate commandes.toml --left web1.csv --right desktop.xlsx")]
    Validate {
        config: PathBuf,

        #[arg(long, requires = "right")]
        left: Option<PathBuf>,

        #[arg(long, requires = "left")]
        right: Option<PathBuf>,
    },

    /// Browse and manage recorded runs
    #[command(subcommand)]
    Runs(RunsCommands),
}

#[derive(Subcommand)]
enum RunsCommands {
    /// List runs, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long, default_value_t = 50)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Show one run
    Show {
        id: RunId,

        #[arg(long)]
        json: bool,
    },

    /// Print a run's stored diff preview
    Preview {
        id: RunId,

        #[arg(long, default_value_t = 20)]
        rows: usize,

        #[arg(long)]
        json: bool,
    },

    /// Latest relevant run for a config: newest success with differences,
    /// else newest run
    Latest {
        config: String,

        #[arg(long)]
        json: bool,
    },

    /// Set a run's title and notes
    Annotate {
        id: RunId,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete runs and their previews
    Delete {
        #[arg(required = true)]
        ids: Vec<RunId>,
    },

    /// Totals over runs: count, successes, failures, rows read, differences
    Stats {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// running, success or failed
    #[arg(long)]
    status: Option<RunStatus>,

    /// Config name
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    category: Option<String>,

    /// Store code inferred from source file names
    #[arg(long)]
    store: Option<String>,
}

impl FilterArgs {
    fn into_filter(self, limit: Option<usize>) -> RunFilter {
        RunFilter {
            status: self.status,
            config_ref: self.config,
            category: self.category,
            store: self.store,
            limit,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("ECARTS_COMMIT"), ")",
        "\ntarget:  ", env!("ECARTS_TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("ECARTS_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = Context { settings_path: cli.settings, ledger_path: cli.ledger };
    let result = match cli.command {
        Commands::Compare { config, left, right, left_header_line, right_header_line, json } => {
            cmd_compare(&ctx, config, left, right, left_header_line, right_header_line, json)
        }
        Commands::Peek { file, rows, json } => cmd_peek(&ctx, &file, rows, json),
        Commands::Headers { file, header_line, json } => cmd_headers(&ctx, &file, header_line, json),
        Commands::Validate { config, left, right } => cmd_validate(&ctx, &config, left, right),
        Commands::Runs(command) => cmd_runs(&ctx, command),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(err: io::Error) -> Self {
        Self::new(EXIT_RUN_FAILED, err.to_string())
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::Invalid(e) if e.is_config_error() => {
                Some("check column and key names against `ecarts headers <file>`".to_string())
            }
            _ => None,
        };
        Self { code: EXIT_CONFIG, message: err.to_string(), hint }
    }
}

impl From<IngestError> for CliError {
    fn from(err: IngestError) -> Self {
        let hint = match &err {
            IngestError::HeaderRowOutOfRange { .. } => {
                Some("use `ecarts peek <file>` to find the header line".to_string())
            }
            IngestError::DecodeError { .. } => {
                Some("re-export the file as UTF-8 CSV or as .xlsx".to_string())
            }
            _ => None,
        };
        Self { code: EXIT_SOURCE, message: err.to_string(), hint }
    }
}

impl From<LedgerError> for CliError {
    fn from(err: LedgerError) -> Self {
        let hint = match &err {
            LedgerError::NotFound(_) => Some("list runs with `ecarts runs list`".to_string()),
            _ => None,
        };
        Self { code: EXIT_LEDGER, message: err.to_string(), hint }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        let code = pipeline_exit_code(&err);
        match err {
            PipelineError::Config(e) => e.into(),
            PipelineError::Ingest { side, source } => {
                let inner = CliError::from(source);
                Self { code, message: format!("{side} source: {}", inner.message), hint: inner.hint }
            }
            PipelineError::Ledger(e) => e.into(),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::io(err)
    }
}

// ============================================================================
// Shared setup
// ============================================================================

struct Context {
    settings_path: Option<PathBuf>,
    ledger_path: Option<PathBuf>,
}

impl Context {
    fn settings(&self) -> Result<Settings, CliError> {
        match &self.settings_path {
            Some(path) => Ok(Settings::load_from(path)?),
            None => Ok(Settings::load()),
        }
    }

    fn ledger(&self, settings: &Settings) -> Result<LedgerStore, CliError> {
        let path = self.ledger_path.clone().unwrap_or_else(|| settings.ledger_path());
        Ok(LedgerStore::open(&path)?)
    }

    fn ingest_options(&self, settings: &Settings) -> IngestOptions {
        IngestOptions {
            sniff_bytes: settings.sniff_bytes,
            na_tokens: settings.na_tokens,
            ..IngestOptions::default()
        }
    }
}

/// 1-based line from the command line to a 0-based row.
fn line_to_row(line: u64) -> usize {
    (line - 1) as usize
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_RUN_FAILED, e.to_string()))?;
    let mut out = io::stdout().lock();
    writeln!(out, "{}", text)?;
    Ok(())
}

// ============================================================================
// compare
// ============================================================================

fn cmd_compare(
    ctx: &Context,
    config_path: PathBuf,
    left: PathBuf,
    right: PathBuf,
    left_header_line: Option<u64>,
    right_header_line: Option<u64>,
    json: bool,
) -> Result<(), CliError> {
    let settings = ctx.settings()?;
    let config = CompareConfig::load(&config_path)?;
    let mut ledger = ctx.ledger(&settings)?;

    let mut request = CompareRequest::new(config, left, right);
    request.left_header_row = left_header_line.map(line_to_row);
    request.right_header_row = right_header_line.map(line_to_row);

    let run = run_comparison(&request, &settings, &mut ledger)?;

    if json {
        print_json(&run)?;
    } else {
        print_run(&run)?;
    }

    match run.status {
        RunStatus::Success => Ok(()),
        _ => Err(CliError::new(
            EXIT_RUN_FAILED,
            format!("run {} failed: {}", run.id, run.message.as_deref().unwrap_or("unknown error")),
        )),
    }
}

fn print_run(run: &Run) -> Result<(), CliError> {
    let mut out = io::stdout().lock();
    writeln!(out, "run {}: {}", run.id, run.status)?;
    writeln!(out, "  config:   {}", run.config_ref)?;
    if let Some(category) = &run.category {
        writeln!(out, "  category: {}", category)?;
    }
    writeln!(out, "  left:     {}", run.left_ref)?;
    writeln!(out, "  right:    {}", run.right_ref)?;
    if let Some(store) = &run.store {
        writeln!(out, "  store:    {}", store)?;
    }
    writeln!(out, "  started:  {}", run.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    if let Some(elapsed) = run.duration() {
        writeln!(out, "  duration: {} ms", elapsed.num_milliseconds())?;
    }
    if run.status == RunStatus::Success {
        writeln!(out, "  rows:     {} read, {} differing", run.total_rows, run.diff_rows)?;
    }
    if let Some(csv) = &run.exports.csv {
        writeln!(out, "  csv:      {}", csv)?;
    }
    if let Some(xlsx) = &run.exports.xlsx {
        writeln!(out, "  xlsx:     {}", xlsx)?;
    }
    if let Some(title) = &run.title {
        writeln!(out, "  title:    {}", title)?;
    }
    if let Some(notes) = &run.notes {
        writeln!(out, "  notes:    {}", notes)?;
    }
    if let Some(message) = &run.message {
        writeln!(out, "  message:  {}", message)?;
    }
    Ok(())
}

// ============================================================================
// peek / headers / validate
// ============================================================================

fn cmd_peek(ctx: &Context, file: &Path, rows: usize, json: bool) -> Result<(), CliError> {
    let settings = ctx.settings()?;
    let grid = peek_rows(file, rows, &ctx.ingest_options(&settings))?;

    if json {
        return print_json(&grid);
    }

    let mut out = io::stdout().lock();
    if let Some(store) = infer_store_from_filename(file) {
        writeln!(out, "store: {}", store)?;
    }
    for (i, row) in grid.iter().enumerate() {
        writeln!(out, "{:>4} | {}", i + 1, row.join(" | "))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct HeadersReport<'a> {
    file: String,
    header_line: u64,
    columns: &'a [String],
    suggestions: Suggestions,
}

fn cmd_headers(ctx: &Context, file: &Path, header_line: u64, json: bool) -> Result<(), CliError> {
    let settings = ctx.settings()?;
    let columns = read_headers(file, line_to_row(header_line), &ctx.ingest_options(&settings))?;
    let suggestions = suggest(&columns);

    if json {
        return print_json(&HeadersReport {
            file: file.display().to_string(),
            header_line,
            columns: &columns,
            suggestions,
        });
    }

    let mut out = io::stdout().lock();
    for name in &columns {
        writeln!(out, "{}", name)?;
    }
    let guesses = [
        ("order date", &suggestions.order_date),
        ("delivery date", &suggestions.delivery_date),
        ("store", &suggestions.store),
    ];
    for (label, guess) in guesses {
        if let Some(column) = guess {
            writeln!(out, "# {}: {}", label, column)?;
        }
    }
    Ok(())
}

fn cmd_validate(
    ctx: &Context,
    config_path: &Path,
    left: Option<PathBuf>,
    right: Option<PathBuf>,
) -> Result<(), CliError> {
    let settings = ctx.settings()?;
    let config = CompareConfig::load(config_path)?;
    let spec = config.to_join_spec(settings.suffixes())?;
    let sides = format!("{} vs {}", config.left_label(), config.right_label());

    let spec = match (left, right) {
        (Some(left), Some(right)) => prepare(&CompareRequest::new(config, left, right), &settings)?,
        (None, None) => spec,
        _ => return Err(CliError::args("--left and --right must be given together")),
    };

    let mut out = io::stdout().lock();
    writeln!(out, "ok: {}: {} key(s), join {}", sides, spec.left_keys().len(), spec.join_mode())?;
    let compared = spec.compared_columns();
    if compared.is_empty() {
        writeln!(out, "compared columns: none (only presence is checked)")?;
    } else {
        writeln!(out, "compared columns: {}", compared.join(", "))?;
    }
    Ok(())
}

// ============================================================================
// runs
// ============================================================================

fn cmd_runs(ctx: &Context, command: RunsCommands) -> Result<(), CliError> {
    let settings = ctx.settings()?;
    let mut ledger = ctx.ledger(&settings)?;

    match command {
        RunsCommands::List { filter, limit, json } => {
            let runs = ledger.list(&filter.into_filter(Some(limit)))?;
            if json {
                return print_json(&runs);
            }
            let mut out = io::stdout().lock();
            for run in &runs {
                writeln!(
                    out,
                    "{:>6}  {:<8} {}  {:<20} {:>8} {:>8}  {}",
                    run.id.to_string(),
                    run.status.as_str(),
                    run.started_at.format("%Y-%m-%d %H:%M"),
                    run.config_ref,
                    run.total_rows,
                    run.diff_rows,
                    run.title.as_deref().or(run.message.as_deref()).unwrap_or(""),
                )?;
            }
            if runs.is_empty() {
                writeln!(out, "no runs")?;
            }
            Ok(())
        }
        RunsCommands::Show { id, json } => {
            let run = ledger.get(id)?;
            if json {
                print_json(&run)
            } else {
                print_run(&run)
            }
        }
        RunsCommands::Preview { id, rows, json } => {
            let preview = ledger.preview(id)?;
            let shown = &preview[..rows.min(preview.len())];
            if json {
                return print_json(&shown);
            }
            let mut out = io::stdout().lock();
            if let Some(first) = shown.first() {
                let header: Vec<&str> = first.keys().map(String::as_str).collect();
                writeln!(out, "{}", header.join(" | "))?;
            }
            for row in shown {
                let cells: Vec<&str> = row.values().map(|v| v.as_str().unwrap_or("")).collect();
                writeln!(out, "{}", cells.join(" | "))?;
            }
            if preview.len() > shown.len() {
                writeln!(out, "... {} more row(s) in preview", preview.len() - shown.len())?;
            }
            Ok(())
        }
        RunsCommands::Latest { config, json } => match ledger.latest_for_config(&config)? {
            Some(run) if json => print_json(&run),
            Some(run) => print_run(&run),
            None => Err(CliError::new(EXIT_LEDGER, format!("no runs for config '{config}'"))),
        },
        RunsCommands::Annotate { id, title, notes } => {
            let run = ledger.annotate(id, title.as_deref(), notes.as_deref())?;
            print_run(&run)
        }
        RunsCommands::Delete { ids } => {
            let deleted = ledger.delete(&ids)?;
            writeln!(io::stdout().lock(), "deleted {} run(s)", deleted)?;
            if deleted < ids.len() {
                return Err(CliError::new(
                    EXIT_LEDGER,
                    format!("{} id(s) did not match a run", ids.len() - deleted),
                ));
            }
            Ok(())
        }
        RunsCommands::Stats { filter, json } => {
            let stats = ledger.stats(&filter.into_filter(None))?;
            if json {
                return print_json(&stats);
            }
            let mut out = io::stdout().lock();
            writeln!(out, "runs:        {}", stats.total)?;
            writeln!(out, "success:     {}", stats.success)?;
            writeln!(out, "failed:      {}", stats.failed)?;
            writeln!(out, "rows read:   {}", stats.rows)?;
            writeln!(out, "differences: {}", stats.diffs)?;
            Ok(())
        }
    }
}
