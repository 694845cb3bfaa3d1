//! The migration engine: scan, plan, and apply versions in order, recording
//! each success in the version ledger.
//!
//! Application of one version follows a three-phase protocol. The `init`
//! script (if present) is split with [Dialect::Go] and executed statement by
//! statement; the programmatic `migration` step (if registered) runs a
//! [MigrationHandler] against the provider; the `finalize` script (if
//! present) runs with the same discipline as `init`. Only when all phases
//! succeed is a ledger row appended, so a partially-applied version is
//! re-attempted from its `init` phase on the next run. That can double-apply
//! non-idempotent DDL; scripts are expected to be written idempotently
//! (`CREATE TABLE IF NOT EXISTS` style).
//!
//! No rollback is attempted on failure. Callers wanting atomicity can wrap
//! [MigrationEngine::migrate] in an explicit transaction scope when the
//! provider supports one.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::error::Error;
use crate::ledger::{VersionLedger, DEFAULT_VERSION_TABLE_NAME};
use crate::planner::plan;
use crate::provider::{run_script, SqlProvider};
use crate::sources::{MigrationSources, ScriptLocator, ScriptPhase};
use crate::splitter::Dialect;

/// Captures free-text output during one version's application. The collected
/// text is persisted into that version's ledger row.
#[derive(Debug, Default)]
pub struct MigrationLog {
    lines: Vec<String>,
}

impl MigrationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// The programmatic `migration` phase of a version: arbitrary host logic run
/// against the live provider. Handlers are registered on the engine by
/// version key at construction time; nothing is loaded from disk at runtime.
pub trait MigrationHandler: Send + Sync {
    fn run(
        &self,
        token: &CancellationToken,
        provider: &dyn SqlProvider,
        log: &mut MigrationLog,
    ) -> Result<(), Error>;
}

impl<F> MigrationHandler for F
where
    F: Fn(&CancellationToken, &dyn SqlProvider, &mut MigrationLog) -> Result<(), Error>
        + Send
        + Sync,
{
    fn run(
        &self,
        token: &CancellationToken,
        provider: &dyn SqlProvider,
        log: &mut MigrationLog,
    ) -> Result<(), Error> {
        self(token, provider, log)
    }
}

/// A report of actions performed during a migration run.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub ledger_existed: bool,
    pub ledger_created: bool,
    pub versions_applied: Vec<String>,
}

/// The entrypoint for applying a directory tree of versioned scripts to a
/// database.
///
/// # Example
/// ```
/// use migradir::{
///     CancellationToken, MigrationEngine, MigrationSources, ScriptLocator, SqliteProvider,
///     VersionScripts,
/// };
/// use rusqlite::Connection;
///
/// let sources = MigrationSources::new().with_version(
///     "0001",
///     VersionScripts {
///         init: Some(ScriptLocator::Inline(
///             "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);".to_string(),
///         )),
///         ..Default::default()
///     },
/// );
/// let engine = MigrationEngine::new(sources);
///
/// let conn = Connection::open_in_memory().unwrap();
/// let token = CancellationToken::new();
/// let report = engine.install(&token, &SqliteProvider::new(&conn)).unwrap();
/// assert_eq!(report.versions_applied, vec!["0001"]);
/// assert_eq!(
///     engine.get_current_version(&token, &SqliteProvider::new(&conn)).unwrap(),
///     Some("0001".to_string())
/// );
/// ```
pub struct MigrationEngine {
    sources: MigrationSources,
    handlers: BTreeMap<String, Box<dyn MigrationHandler>>,
    version_table_name: String,
    on_version_start: Option<Box<dyn Fn(&str) + Send + Sync>>,
    on_version_complete: Option<Box<dyn Fn(&str, Duration) + Send + Sync>>,
    on_version_error: Option<Box<dyn Fn(&str, &Error) + Send + Sync>>,
}

// Manual Debug impl since closures don't implement Debug
impl std::fmt::Debug for MigrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEngine")
            .field("sources", &self.sources)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("version_table_name", &self.version_table_name)
            .field("on_version_start", &self.on_version_start.is_some())
            .field("on_version_complete", &self.on_version_complete.is_some())
            .field("on_version_error", &self.on_version_error.is_some())
            .finish()
    }
}

impl MigrationEngine {
    pub fn new(sources: MigrationSources) -> Self {
        Self {
            sources,
            handlers: BTreeMap::new(),
            version_table_name: DEFAULT_VERSION_TABLE_NAME.to_string(),
            on_version_start: None,
            on_version_complete: None,
            on_version_error: None,
        }
    }

    /// Set a custom name for the version ledger table.
    /// Defaults to `_migradir_version_`.
    pub fn with_version_table_name(mut self, name: impl Into<String>) -> Self {
        self.version_table_name = name.into();
        self
    }

    /// Register the programmatic `migration` step for a version.
    pub fn with_handler(
        mut self,
        version: impl Into<String>,
        handler: impl MigrationHandler + 'static,
    ) -> Self {
        self.handlers.insert(version.into(), Box::new(handler));
        self
    }

    /// Set a callback to be invoked when a version starts applying.
    pub fn on_version_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_version_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a version has been applied and
    /// recorded. The callback receives the version and its duration.
    pub fn on_version_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.on_version_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a version fails. Not invoked for
    /// cooperative cancellation.
    pub fn on_version_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &Error) + Send + Sync + 'static,
    {
        self.on_version_error = Some(Box::new(callback));
        self
    }

    /// The set of discovered versions this engine was constructed with.
    pub fn sources(&self) -> &MigrationSources {
        &self.sources
    }

    /// The name of the version ledger table this engine reads and writes.
    pub fn version_table_name(&self) -> &str {
        &self.version_table_name
    }

    /// The lexically-maximum recorded version, or `None` when the ledger
    /// table is absent or empty.
    pub fn get_current_version(
        &self,
        token: &CancellationToken,
        provider: &dyn SqlProvider,
    ) -> Result<Option<String>, Error> {
        VersionLedger::new(provider, &self.version_table_name).get_current_version(token)
    }

    /// Bring a fresh database all the way up to the latest discovered
    /// version. Equivalent to [migrate](Self::migrate) with no target.
    pub fn install(
        &self,
        token: &CancellationToken,
        provider: &dyn SqlProvider,
    ) -> Result<MigrationReport, Error> {
        self.migrate(token, provider, None)
    }

    /// Apply all unapplied versions up to and including `target` (all of
    /// them when `target` is `None`), recording each success in the ledger.
    ///
    /// The ledger table is auto-created only on a verified-empty database; a
    /// non-empty database without it fails with
    /// [Error::UnmigratableDatabase](crate::Error::UnmigratableDatabase)
    /// before anything is planned.
    pub fn migrate(
        &self,
        token: &CancellationToken,
        provider: &dyn SqlProvider,
        target: Option<&str>,
    ) -> Result<MigrationReport, Error> {
        token.check()?;

        let ledger = VersionLedger::new(provider, &self.version_table_name);
        let ledger_existed = ledger.exists(token)?;
        let mut ledger_created = false;
        if !ledger_existed {
            let table_count = provider
                .scalar(
                    token,
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                    &[],
                )?
                .as_integer()?;
            if table_count != 0 {
                return Err(Error::UnmigratableDatabase(format!(
                    "the database has tables but no version table {}; there is no safe starting point",
                    self.version_table_name
                )));
            }
            ledger.create(token)?;
            ledger_created = true;
        }

        let current = ledger.get_current_version(token)?;
        let planned = plan(self.sources.versions(), current.as_deref(), target);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            current_version = ?current,
            target_version = ?target,
            planned = ?planned,
            "Computed migration plan"
        );

        // Validate the plan before any statement executes, so a bad layout
        // can never leave a half-applied run behind.
        for version in &planned {
            let scripts = self.scripts_for(version)?;
            if scripts.migration.is_some() && !self.handlers.contains_key(version) {
                let path = match &scripts.migration {
                    Some(ScriptLocator::Path(p)) => p.clone(),
                    _ => PathBuf::from(version),
                };
                return Err(Error::InvalidLayout {
                    path,
                    reason: format!(
                        "version {} declares a programmatic migration step but no handler is registered",
                        version
                    ),
                });
            }
        }

        let mut versions_applied: Vec<String> = Vec::new();
        for version in &planned {
            token.check()?;
            if let Some(callback) = &self.on_version_start {
                callback(version);
            }
            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!("apply_version", version = %version).entered();
            let started = std::time::Instant::now();
            match self.apply_version(token, provider, &ledger, version) {
                Ok(()) => {
                    versions_applied.push(version.clone());
                    if let Some(callback) = &self.on_version_complete {
                        callback(version, started.elapsed());
                    }
                    #[cfg(feature = "tracing")]
                    tracing::info!(duration = ?started.elapsed(), "Version applied");
                }
                Err(error) => {
                    if !matches!(error, Error::Cancelled) {
                        if let Some(callback) = &self.on_version_error {
                            callback(version, &error);
                        }
                        #[cfg(feature = "tracing")]
                        tracing::error!(error = %error, "Version failed");
                    }
                    return Err(error);
                }
            }
        }

        Ok(MigrationReport {
            ledger_existed,
            ledger_created,
            versions_applied,
        })
    }

    fn scripts_for(&self, version: &str) -> Result<&crate::sources::VersionScripts, Error> {
        self.sources
            .scripts(version)
            .ok_or_else(|| Error::Generic(format!("unknown version in plan: {}", version)))
    }

    fn apply_version(
        &self,
        token: &CancellationToken,
        provider: &dyn SqlProvider,
        ledger: &VersionLedger<'_>,
        version: &str,
    ) -> Result<(), Error> {
        let scripts = self.scripts_for(version)?;
        let mut log = MigrationLog::new();

        if let Some(locator) = &scripts.init {
            token.check()?;
            let text = locator
                .load(token)
                .map_err(|e| e.in_phase(version, ScriptPhase::Init))?;
            let executed = run_script(token, provider, &text, Dialect::Go)
                .map_err(|e| e.in_phase(version, ScriptPhase::Init))?;
            log.append(format!("init: executed {} statement(s)", executed));
        }

        if let Some(handler) = self.handlers.get(version) {
            token.check()?;
            handler
                .run(token, provider, &mut log)
                .map_err(|e| e.in_phase(version, ScriptPhase::Migration))?;
        }

        if let Some(locator) = &scripts.finalize {
            token.check()?;
            let text = locator
                .load(token)
                .map_err(|e| e.in_phase(version, ScriptPhase::Finalize))?;
            let executed = run_script(token, provider, &text, Dialect::Go)
                .map_err(|e| e.in_phase(version, ScriptPhase::Finalize))?;
            log.append(format!("finalize: executed {} statement(s)", executed));
        }

        token.check()?;
        ledger.record_applied(token, version, &log.text())
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;

    use super::*;
    use crate::provider::{SqlParam, SqliteProvider};
    use crate::sources::VersionScripts;

    fn init_only(script: &str) -> VersionScripts {
        VersionScripts {
            init: Some(ScriptLocator::Inline(script.to_string())),
            ..Default::default()
        }
    }

    fn ledger_rows(conn: &Connection) -> Vec<(String, i64, String)> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT version, date_unix_deployed_at, log FROM {} ORDER BY rowid",
                DEFAULT_VERSION_TABLE_NAME
            ))
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn install_applies_all_versions_in_order_and_records_the_ledger() {
        let sources = MigrationSources::new()
            .with_version("0001", init_only("CREATE TABLE a (id INTEGER);"))
            .with_version("0002", init_only("CREATE TABLE b (id INTEGER);"));
        let engine = MigrationEngine::new(sources);
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();

        let report = engine.install(&token, &SqliteProvider::new(&conn)).unwrap();
        assert_eq!(
            report,
            MigrationReport {
                ledger_existed: false,
                ledger_created: true,
                versions_applied: vec!["0001".to_string(), "0002".to_string()],
            }
        );

        let rows = ledger_rows(&conn);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "0001");
        assert_eq!(rows[1].0, "0002");
        // timestamps are non-decreasing in plan order
        assert!(rows[0].1 <= rows[1].1);
        assert_eq!(
            table_names(&conn),
            vec![
                DEFAULT_VERSION_TABLE_NAME.to_string(),
                "a".to_string(),
                "b".to_string()
            ]
        );
    }

    #[test]
    fn rerunning_after_success_applies_nothing() {
        let sources = MigrationSources::new()
            .with_version("0001", init_only("CREATE TABLE a (id INTEGER);"));
        let engine = MigrationEngine::new(sources);
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();

        engine.install(&token, &SqliteProvider::new(&conn)).unwrap();
        let report = engine
            .migrate(&token, &SqliteProvider::new(&conn), None)
            .unwrap();
        assert_eq!(
            report,
            MigrationReport {
                ledger_existed: true,
                ledger_created: false,
                versions_applied: vec![],
            }
        );
        assert_eq!(ledger_rows(&conn).len(), 1);
    }

    #[test]
    fn target_version_is_an_inclusive_ceiling() {
        let sources = MigrationSources::new()
            .with_version("0001", init_only("CREATE TABLE a (id INTEGER);"))
            .with_version("0002", init_only("CREATE TABLE b (id INTEGER);"))
            .with_version("0003", init_only("CREATE TABLE c (id INTEGER);"));
        let engine = MigrationEngine::new(sources);
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();

        let report = engine
            .migrate(&token, &SqliteProvider::new(&conn), Some("0002"))
            .unwrap();
        assert_eq!(report.versions_applied, vec!["0001", "0002"]);
        assert_eq!(
            engine
                .get_current_version(&token, &SqliteProvider::new(&conn))
                .unwrap(),
            Some("0002".to_string())
        );

        // a later run without a target picks up where the ledger left off
        let report = engine
            .migrate(&token, &SqliteProvider::new(&conn), None)
            .unwrap();
        assert_eq!(report.versions_applied, vec!["0003"]);
    }

    #[test]
    fn non_empty_database_without_a_ledger_is_unmigratable() {
        let sources = MigrationSources::new()
            .with_version("0001", init_only("CREATE TABLE a (id INTEGER);"));
        let engine = MigrationEngine::new(sources);
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE unrelated (id INTEGER)", [])
            .unwrap();
        let token = CancellationToken::new();

        let result = engine.install(&token, &SqliteProvider::new(&conn));
        assert!(matches!(result, Err(Error::UnmigratableDatabase(_))));
        // nothing was applied
        assert_eq!(table_names(&conn), vec!["unrelated".to_string()]);
    }

    #[test]
    fn migration_marker_without_a_registered_handler_fails_before_anything_runs() {
        let sources = MigrationSources::new()
            .with_version("0001", init_only("CREATE TABLE a (id INTEGER);"))
            .with_version(
                "0002",
                VersionScripts {
                    migration: Some(ScriptLocator::Inline(String::new())),
                    ..Default::default()
                },
            );
        let engine = MigrationEngine::new(sources);
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();

        let result = engine.install(&token, &SqliteProvider::new(&conn));
        assert!(matches!(result, Err(Error::InvalidLayout { .. })));
        // version 0001 never ran: only the bootstrapped ledger table exists
        assert_eq!(
            table_names(&conn),
            vec![DEFAULT_VERSION_TABLE_NAME.to_string()]
        );
        assert!(ledger_rows(&conn).is_empty());
    }

    #[test]
    fn handler_runs_between_init_and_finalize_with_log_capture() {
        let sources = MigrationSources::new().with_version(
            "0001",
            VersionScripts {
                init: Some(ScriptLocator::Inline(
                    "CREATE TABLE counters (n INTEGER);\n-- GO\nINSERT INTO counters VALUES (1);"
                        .to_string(),
                )),
                migration: Some(ScriptLocator::Inline(String::new())),
                finalize: Some(ScriptLocator::Inline(
                    "CREATE INDEX ix_counters ON counters(n);".to_string(),
                )),
            },
        );
        let engine = MigrationEngine::new(sources).with_handler(
            "0001",
            |token: &CancellationToken,
             provider: &dyn SqlProvider,
             log: &mut MigrationLog|
             -> Result<(), Error> {
                // the init phase has already run: double every counter
                let n = provider
                    .scalar(token, "SELECT n FROM counters", &[])?
                    .as_integer()?;
                provider.execute(
                    token,
                    "UPDATE counters SET n = ?",
                    &[SqlParam::from(n * 2)],
                )?;
                log.append(format!("doubled counter from {} to {}", n, n * 2));
                Ok(())
            },
        );
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();

        engine.install(&token, &SqliteProvider::new(&conn)).unwrap();
        let n: i64 = conn
            .query_row("SELECT n FROM counters", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 2);

        let rows = ledger_rows(&conn);
        assert_eq!(rows.len(), 1);
        let log = &rows[0].2;
        assert!(log.contains("init: executed 2 statement(s)"));
        assert!(log.contains("doubled counter from 1 to 2"));
        assert!(log.contains("finalize: executed 1 statement(s)"));
    }

    #[test]
    fn statement_failure_identifies_version_phase_and_statement() {
        let sources = MigrationSources::new()
            .with_version("0001", init_only("CREATE TABLE a (id INTEGER);"))
            .with_version("0002", init_only("bleep blorp;"));
        let engine = MigrationEngine::new(sources);
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();

        let error = engine
            .install(&token, &SqliteProvider::new(&conn))
            .unwrap_err();
        match error {
            Error::Version {
                version,
                phase,
                source,
            } => {
                assert_eq!(version, "0002");
                assert_eq!(phase, ScriptPhase::Init);
                match *source {
                    Error::Statement { statement, .. } => assert_eq!(statement, "bleep blorp;"),
                    other => panic!("expected Statement error, got {:?}", other),
                }
            }
            other => panic!("expected Version error, got {:?}", other),
        }
        // the earlier version is recorded; the failed one is not
        let rows = ledger_rows(&conn);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "0001");
    }

    #[test]
    fn failed_version_is_reattempted_from_init_on_the_next_run() {
        // a finalize failure after init succeeded leaves no ledger row, so
        // the next run replays init: the known double-apply hazard that
        // idempotent scripts absorb
        let init = "CREATE TABLE IF NOT EXISTS events (id INTEGER);\n-- GO\nINSERT INTO events VALUES (1);";
        let failing = MigrationEngine::new(MigrationSources::new().with_version(
            "0001",
            VersionScripts {
                init: Some(ScriptLocator::Inline(init.to_string())),
                finalize: Some(ScriptLocator::Inline("bleep blorp;".to_string())),
                ..Default::default()
            },
        ));
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();
        assert!(failing.install(&token, &SqliteProvider::new(&conn)).is_err());
        assert!(ledger_rows(&conn).is_empty());

        let fixed = MigrationEngine::new(MigrationSources::new().with_version(
            "0001",
            VersionScripts {
                init: Some(ScriptLocator::Inline(init.to_string())),
                finalize: Some(ScriptLocator::Inline(
                    "CREATE INDEX ix_events ON events(id);".to_string(),
                )),
                ..Default::default()
            },
        ));
        fixed.install(&token, &SqliteProvider::new(&conn)).unwrap();
        assert_eq!(ledger_rows(&conn).len(), 1);
        let inserted: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(inserted, 2); // init ran twice
    }

    #[test]
    fn cancellation_surfaces_as_cancelled_not_as_a_version_failure() {
        let token = CancellationToken::new();
        let cancel_handle = token.clone();
        let sources = MigrationSources::new().with_version(
            "0001",
            VersionScripts {
                init: Some(ScriptLocator::Inline("CREATE TABLE a (id INTEGER);".to_string())),
                migration: Some(ScriptLocator::Inline(String::new())),
                finalize: Some(ScriptLocator::Inline(
                    "CREATE TABLE never (id INTEGER);".to_string(),
                )),
            },
        );
        let engine = MigrationEngine::new(sources).with_handler(
            "0001",
            move |_token: &CancellationToken,
                  _provider: &dyn SqlProvider,
                  _log: &mut MigrationLog|
                  -> Result<(), Error> {
                cancel_handle.cancel();
                Ok(())
            },
        );
        let conn = Connection::open_in_memory().unwrap();

        let result = engine.install(&token, &SqliteProvider::new(&conn));
        assert_eq!(result, Err(Error::Cancelled));
        // the finalize phase never dispatched and no ledger row was written
        assert!(!table_names(&conn).contains(&"never".to_string()));
        assert!(ledger_rows(&conn).is_empty());
    }

    #[test]
    fn callbacks_observe_starts_completions_and_errors() {
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sources = MigrationSources::new()
            .with_version("0001", init_only("CREATE TABLE a (id INTEGER);"))
            .with_version("0002", init_only("bleep blorp;"));
        let engine = {
            let started = events.clone();
            let completed = events.clone();
            let errored = events.clone();
            MigrationEngine::new(sources)
                .on_version_start(move |version| {
                    started.lock().unwrap().push(format!("start {}", version));
                })
                .on_version_complete(move |version, _duration| {
                    completed
                        .lock()
                        .unwrap()
                        .push(format!("complete {}", version));
                })
                .on_version_error(move |version, _error| {
                    errored.lock().unwrap().push(format!("error {}", version));
                })
        };
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();

        assert!(engine.install(&token, &SqliteProvider::new(&conn)).is_err());
        assert_eq!(
            *events.lock().unwrap(),
            vec!["start 0001", "complete 0001", "start 0002", "error 0002"]
        );
    }

    #[test]
    fn get_current_version_reads_the_lexical_maximum() {
        let sources = MigrationSources::new()
            .with_version("0001", init_only("CREATE TABLE a (id INTEGER);"))
            .with_version("0002", init_only("CREATE TABLE b (id INTEGER);"));
        let engine = MigrationEngine::new(sources);
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();

        assert_eq!(
            engine
                .get_current_version(&token, &SqliteProvider::new(&conn))
                .unwrap(),
            None
        );
        engine.install(&token, &SqliteProvider::new(&conn)).unwrap();
        assert_eq!(
            engine
                .get_current_version(&token, &SqliteProvider::new(&conn))
                .unwrap(),
            Some("0002".to_string())
        );
    }

    #[test]
    fn custom_version_table_name_is_used_for_bookkeeping() {
        let sources = MigrationSources::new()
            .with_version("0001", init_only("CREATE TABLE a (id INTEGER);"));
        let engine = MigrationEngine::new(sources).with_version_table_name("my_versions");
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();

        engine.install(&token, &SqliteProvider::new(&conn)).unwrap();
        assert_eq!(
            table_names(&conn),
            vec!["a".to_string(), "my_versions".to_string()]
        );
    }

    #[test]
    fn filesystem_sources_drive_a_full_install() {
        let root = tempfile::tempdir().unwrap();
        let v1 = root.path().join("0001");
        std::fs::create_dir(&v1).unwrap();
        std::fs::write(
            v1.join("init.sql"),
            "CREATE TABLE tb_1 (varcharValue TEXT, intValue INTEGER);\n-- GO\nINSERT INTO tb_1 VALUES ('one', 1);\nINSERT INTO tb_1 VALUES ('two', 2);\nINSERT INTO tb_1 VALUES ('three', 3);\n",
        )
        .unwrap();
        let v2 = root.path().join("0002");
        std::fs::create_dir(&v2).unwrap();
        std::fs::write(v2.join("finalize.sql"), "CREATE INDEX ix_tb_1 ON tb_1(intValue);")
            .unwrap();

        let sources = MigrationSources::from_filesystem(root.path()).unwrap();
        let engine = MigrationEngine::new(sources);
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();

        let report = engine.install(&token, &SqliteProvider::new(&conn)).unwrap();
        assert_eq!(report.versions_applied, vec!["0001", "0002"]);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tb_1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[cfg(feature = "tracing")]
    #[test]
    #[tracing_test::traced_test]
    fn tracing_records_the_plan_and_applied_versions() {
        let sources = MigrationSources::new()
            .with_version("0001", init_only("CREATE TABLE a (id INTEGER);"));
        let engine = MigrationEngine::new(sources);
        let conn = Connection::open_in_memory().unwrap();
        let token = CancellationToken::new();
        engine.install(&token, &SqliteProvider::new(&conn)).unwrap();
        assert!(logs_contain("Computed migration plan"));
        assert!(logs_contain("Version applied"));
    }
}
