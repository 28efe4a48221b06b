// SQLite-backed run ledger

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::error::LedgerError;
use crate::model::{
    ExportLocations, LedgerStats, PreviewRow, Run, RunFilter, RunId, RunInputs, RunOutcome, RunStatus,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    config_ref TEXT NOT NULL,
    category TEXT,
    left_ref TEXT NOT NULL,
    right_ref TEXT NOT NULL,
    store TEXT,
    status TEXT NOT NULL DEFAULT 'running',  -- running | success | failed
    total_rows INTEGER NOT NULL DEFAULT 0,
    diff_rows INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,                -- RFC 3339, UTC
    finished_at TEXT,
    message TEXT,
    export_csv TEXT,
    export_xlsx TEXT,
    title TEXT,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS runs_status ON runs (status);
CREATE INDEX IF NOT EXISTS runs_config ON runs (config_ref);

CREATE TABLE IF NOT EXISTS run_results (
    run_id INTEGER PRIMARY KEY REFERENCES runs (id),
    payload TEXT NOT NULL                    -- JSON array of row objects
);
"#;

const RUN_COLUMNS: &str = "id, config_ref, category, left_ref, right_ref, store, status, \
     total_rows, diff_rows, started_at, finished_at, message, export_csv, export_xlsx, title, notes";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle on the ledger database. One per invocation; independent handles on
/// the same file may create runs concurrently.
pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened ledger");

        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, LedgerError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Record a new run in `running` state.
    pub fn start(&self, inputs: &RunInputs) -> Result<Run, LedgerError> {
        let started_at = now();
        self.conn.execute(
            "INSERT INTO runs (config_ref, category, left_ref, right_ref, store, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'running', ?6)",
            params![
                inputs.config_ref,
                inputs.category,
                inputs.left_ref,
                inputs.right_ref,
                inputs.store,
                timestamp(&started_at),
            ],
        )?;
        let id = RunId(self.conn.last_insert_rowid());
        tracing::info!(run = id.0, config = %inputs.config_ref, "run started");

        Ok(Run {
            id,
            config_ref: inputs.config_ref.clone(),
            category: inputs.category.clone(),
            left_ref: inputs.left_ref.clone(),
            right_ref: inputs.right_ref.clone(),
            store: inputs.store.clone(),
            status: RunStatus::Running,
            total_rows: 0,
            diff_rows: 0,
            started_at,
            finished_at: None,
            message: None,
            exports: ExportLocations::default(),
            title: None,
            notes: None,
        })
    }

    /// Mark a running run successful and store its preview payload, in one
    /// transaction.
    pub fn complete(&mut self, run: &mut Run, outcome: RunOutcome) -> Result<(), LedgerError> {
        ensure_running(run)?;
        let finished_at = now();
        let payload = serde_json::to_string(&outcome.preview)?;

        // Take the write lock up front so a busy database waits instead of failing
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE runs SET status = 'success', finished_at = ?1, total_rows = ?2, diff_rows = ?3,
                 export_csv = ?4, export_xlsx = ?5
             WHERE id = ?6 AND status = 'running'",
            params![
                timestamp(&finished_at),
                outcome.total_rows as i64,
                outcome.diff_rows as i64,
                outcome.exports.csv,
                outcome.exports.xlsx,
                run.id.0,
            ],
        )?;
        if changed == 0 {
            let status = current_status(&tx, run.id)?;
            return Err(LedgerError::IllegalTransition { id: run.id, status });
        }
        tx.execute(
            "INSERT OR REPLACE INTO run_results (run_id, payload) VALUES (?1, ?2)",
            params![run.id.0, payload],
        )?;
        tx.commit()?;

        run.status = RunStatus::Success;
        run.finished_at = Some(finished_at);
        run.total_rows = outcome.total_rows;
        run.diff_rows = outcome.diff_rows;
        run.exports = outcome.exports;
        tracing::info!(run = run.id.0, total_rows = run.total_rows, diff_rows = run.diff_rows, "run succeeded");
        Ok(())
    }

    /// Mark a running run failed with a diagnostic message.
    pub fn fail(&self, run: &mut Run, message: &str) -> Result<(), LedgerError> {
        ensure_running(run)?;
        let finished_at = now();

        let changed = self.conn.execute(
            "UPDATE runs SET status = 'failed', finished_at = ?1, message = ?2
             WHERE id = ?3 AND status = 'running'",
            params![timestamp(&finished_at), message, run.id.0],
        )?;
        if changed == 0 {
            let status = current_status(&self.conn, run.id)?;
            return Err(LedgerError::IllegalTransition { id: run.id, status });
        }

        run.status = RunStatus::Failed;
        run.finished_at = Some(finished_at);
        run.message = Some(message.to_string());
        tracing::warn!(run = run.id.0, reason = message, "run failed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get(&self, id: RunId) -> Result<Run, LedgerError> {
        self.conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
                params![id.0],
                run_from_row,
            )
            .optional()?
            .ok_or(LedgerError::NotFound(id))
    }

    /// Stored preview rows of a successful run; empty for other runs.
    pub fn preview(&self, id: RunId) -> Result<Vec<PreviewRow>, LedgerError> {
        // Distinguish an unknown id from a run without payload
        self.get(id)?;
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM run_results WHERE run_id = ?1", params![id.0], |row| row.get(0))
            .optional()?;
        match payload {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Vec::new()),
        }
    }

    /// Runs matching `filter`, newest first.
    pub fn list(&self, filter: &RunFilter) -> Result<Vec<Run>, LedgerError> {
        let (clause, values) = where_clause(filter);
        let mut sql = format!("SELECT {RUN_COLUMNS} FROM runs{clause} ORDER BY id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params_from_iter(values.iter()), run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// Counters over every run matching `filter` (its limit is ignored).
    pub fn stats(&self, filter: &RunFilter) -> Result<LedgerStats, LedgerError> {
        let (clause, values) = where_clause(filter);
        let sql = format!(
            "SELECT COUNT(*),
                    COALESCE(SUM(status = 'success'), 0),
                    COALESCE(SUM(status = 'failed'), 0),
                    COALESCE(SUM(total_rows), 0),
                    COALESCE(SUM(diff_rows), 0)
             FROM runs{clause}"
        );
        let stats = self.conn.query_row(&sql, params_from_iter(values.iter()), |row| {
            Ok(LedgerStats {
                total: row.get::<_, i64>(0)? as u64,
                success: row.get::<_, i64>(1)? as u64,
                failed: row.get::<_, i64>(2)? as u64,
                rows: row.get::<_, i64>(3)? as u64,
                diffs: row.get::<_, i64>(4)? as u64,
            })
        })?;
        Ok(stats)
    }

    /// The most relevant run for a config: the latest successful run that
    /// found differences, else the latest run of any kind.
    pub fn latest_for_config(&self, config_ref: &str) -> Result<Option<Run>, LedgerError> {
        let with_diffs = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RUN_COLUMNS} FROM runs
                     WHERE config_ref = ?1 AND status = 'success' AND diff_rows > 0
                     ORDER BY id DESC LIMIT 1"
                ),
                params![config_ref],
                run_from_row,
            )
            .optional()?;
        if with_diffs.is_some() {
            return Ok(with_diffs);
        }

        let latest = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE config_ref = ?1 ORDER BY id DESC LIMIT 1"),
                params![config_ref],
                run_from_row,
            )
            .optional()?;
        Ok(latest)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Set the user-facing title and notes. Allowed in any status; these are
    /// annotations, not part of the run's outcome.
    pub fn annotate(&self, id: RunId, title: Option<&str>, notes: Option<&str>) -> Result<Run, LedgerError> {
        let changed = self.conn.execute(
            "UPDATE runs SET title = ?1, notes = ?2 WHERE id = ?3",
            params![title, notes, id.0],
        )?;
        if changed == 0 {
            return Err(LedgerError::NotFound(id));
        }
        self.get(id)
    }

    /// Delete runs and their payloads. Returns how many runs existed.
    pub fn delete(&mut self, ids: &[RunId]) -> Result<usize, LedgerError> {
        let tx = self.conn.transaction()?;
        let mut deleted = 0;
        for id in ids {
            tx.execute("DELETE FROM run_results WHERE run_id = ?1", params![id.0])?;
            deleted += tx.execute("DELETE FROM runs WHERE id = ?1", params![id.0])?;
        }
        tx.commit()?;
        tracing::info!(requested = ids.len(), deleted, "deleted runs");
        Ok(deleted)
    }
}

// ----------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------

/// Current time at the precision stored in the database.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ensure_running(run: &Run) -> Result<(), LedgerError> {
    if run.status.is_terminal() {
        return Err(LedgerError::IllegalTransition { id: run.id, status: run.status });
    }
    Ok(())
}

fn current_status(conn: &Connection, id: RunId) -> Result<RunStatus, LedgerError> {
    conn.query_row("SELECT status FROM runs WHERE id = ?1", params![id.0], |row| parsed(row, 0))
        .optional()?
        .ok_or(LedgerError::NotFound(id))
}

fn where_clause(filter: &RunFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(status) = filter.status {
        values.push(Value::Text(status.as_str().to_string()));
        conditions.push(format!("status = ?{}", values.len()));
    }
    if let Some(config) = &filter.config_ref {
        values.push(Value::Text(config.clone()));
        conditions.push(format!("config_ref = ?{}", values.len()));
    }
    if let Some(category) = &filter.category {
        values.push(Value::Text(category.clone()));
        conditions.push(format!("category = ?{}", values.len()));
    }
    if let Some(store) = &filter.store {
        values.push(Value::Text(store.clone()));
        conditions.push(format!("store = ?{}", values.len()));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

/// Read a text column through `FromStr`, reporting failures as conversion
/// errors on that column.
fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.to_string().into())
    })
}

fn parsed_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        DateTime::parse_from_rfc3339(&t)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<Run> {
    let started_at = parsed_time(row, 9)?
        .ok_or_else(|| rusqlite::Error::FromSqlConversionFailure(9, Type::Null, "missing start time".into()))?;

    Ok(Run {
        id: RunId(row.get(0)?),
        config_ref: row.get(1)?,
        category: row.get(2)?,
        left_ref: row.get(3)?,
        right_ref: row.get(4)?,
        store: row.get(5)?,
        status: parsed(row, 6)?,
        total_rows: row.get::<_, i64>(7)? as u64,
        diff_rows: row.get::<_, i64>(8)? as u64,
        started_at,
        finished_at: parsed_time(row, 10)?,
        message: row.get(11)?,
        exports: ExportLocations {
            csv: row.get(12)?,
            xlsx: row.get(13)?,
        },
        title: row.get(14)?,
        notes: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(config: &str) -> RunInputs {
        RunInputs {
            config_ref: config.into(),
            category: Some("stock".into()),
            left_ref: "web1.csv".into(),
            right_ref: "desktop.xlsx".into(),
            store: None,
        }
    }

    fn outcome(diff_rows: u64) -> RunOutcome {
        let row: PreviewRow = json!({"id": "1", "_merge": "left_only"})
            .as_object()
            .cloned()
            .unwrap();
        RunOutcome {
            total_rows: 10,
            diff_rows,
            exports: ExportLocations {
                csv: Some("out/a.csv".into()),
                xlsx: Some("out/a.xlsx".into()),
            },
            preview: vec![row],
        }
    }

    #[test]
    fn start_then_complete() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        let mut run = store.start(&inputs("orders")).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        store.complete(&mut run, outcome(1)).unwrap();
        assert_eq!(run.status, RunStatus::Success);

        let stored = store.get(run.id).unwrap();
        assert_eq!(stored.status, RunStatus::Success);
        assert_eq!(stored.total_rows, 10);
        assert_eq!(stored.diff_rows, 1);
        assert_eq!(stored.exports.csv.as_deref(), Some("out/a.csv"));
        assert!(stored.finished_at.unwrap() >= stored.started_at);

        let preview = store.preview(run.id).unwrap();
        assert_eq!(preview.len(), 1);
        let keys: Vec<&String> = preview[0].keys().collect();
        assert_eq!(keys, vec!["id", "_merge"]);
    }

    #[test]
    fn fail_records_message() {
        let store = LedgerStore::open_in_memory().unwrap();
        let mut run = store.start(&inputs("orders")).unwrap();
        store.fail(&mut run, "source file not found: web1.csv").unwrap();

        let stored = store.get(run.id).unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.message.as_deref(), Some("source file not found: web1.csv"));
        assert!(store.preview(run.id).unwrap().is_empty());
    }

    #[test]
    fn terminal_runs_are_immutable() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        let mut run = store.start(&inputs("orders")).unwrap();
        store.complete(&mut run, outcome(0)).unwrap();

        let err = store.complete(&mut run, outcome(5)).unwrap_err();
        assert!(matches!(err, LedgerError::IllegalTransition { status: RunStatus::Success, .. }));
        let err = store.fail(&mut run, "late").unwrap_err();
        assert!(matches!(err, LedgerError::IllegalTransition { status: RunStatus::Success, .. }));
        assert_eq!(store.get(run.id).unwrap().diff_rows, 0);
    }

    #[test]
    fn stale_handle_is_rejected_by_database_guard() {
        let store = LedgerStore::open_in_memory().unwrap();
        let mut run = store.start(&inputs("orders")).unwrap();
        let mut stale = run.clone();

        store.fail(&mut run, "boom").unwrap();
        let err = store.fail(&mut stale, "again").unwrap_err();
        assert!(matches!(err, LedgerError::IllegalTransition { status: RunStatus::Failed, .. }));
        assert_eq!(store.get(run.id).unwrap().message.as_deref(), Some("boom"));
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        let mut a = store.start(&inputs("orders")).unwrap();
        let mut b = store.start(&inputs("stock")).unwrap();
        let _c = store.start(&inputs("orders")).unwrap();
        store.complete(&mut a, outcome(2)).unwrap();
        store.fail(&mut b, "bad").unwrap();

        let all = store.list(&RunFilter::default()).unwrap();
        let ids: Vec<i64> = all.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let orders = store
            .list(&RunFilter { config_ref: Some("orders".into()), ..Default::default() })
            .unwrap();
        assert_eq!(orders.len(), 2);

        let failed = store
            .list(&RunFilter { status: Some(RunStatus::Failed), ..Default::default() })
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, b.id);

        let limited = store.list(&RunFilter { limit: Some(1), ..Default::default() }).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn stats_sum_counters() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        assert_eq!(store.stats(&RunFilter::default()).unwrap(), LedgerStats::default());

        let mut a = store.start(&inputs("orders")).unwrap();
        let mut b = store.start(&inputs("orders")).unwrap();
        store.start(&inputs("orders")).unwrap();
        store.complete(&mut a, outcome(4)).unwrap();
        store.fail(&mut b, "x").unwrap();

        let stats = store.stats(&RunFilter::default()).unwrap();
        assert_eq!(stats, LedgerStats { total: 3, success: 1, failed: 1, rows: 10, diffs: 4 });
    }

    #[test]
    fn latest_prefers_successful_run_with_diffs() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        assert!(store.latest_for_config("orders").unwrap().is_none());

        let mut with_diffs = store.start(&inputs("orders")).unwrap();
        store.complete(&mut with_diffs, outcome(3)).unwrap();
        let mut clean = store.start(&inputs("orders")).unwrap();
        store.complete(&mut clean, outcome(0)).unwrap();

        assert_eq!(store.latest_for_config("orders").unwrap().unwrap().id, with_diffs.id);

        let latest = store.start(&inputs("stock")).unwrap();
        assert_eq!(store.latest_for_config("stock").unwrap().unwrap().id, latest.id);
    }

    #[test]
    fn annotate_and_delete() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        let mut run = store.start(&inputs("orders")).unwrap();
        store.complete(&mut run, outcome(1)).unwrap();

        let annotated = store.annotate(run.id, Some("Janvier"), Some("checked")).unwrap();
        assert_eq!(annotated.title.as_deref(), Some("Janvier"));
        assert_eq!(annotated.status, RunStatus::Success);

        assert!(matches!(store.annotate(RunId(99), None, None), Err(LedgerError::NotFound(RunId(99)))));

        assert_eq!(store.delete(&[run.id, RunId(99)]).unwrap(), 1);
        assert!(matches!(store.get(run.id), Err(LedgerError::NotFound(_))));
        assert!(matches!(store.preview(run.id), Err(LedgerError::NotFound(_))));
    }
}
