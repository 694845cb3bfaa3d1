//! # Migradir
//!
//! `migradir` is a directory-driven database migration engine for SQLite,
//! layered on a minimal embedded-SQL-provider abstraction.
//!
//! A migration root is a directory with one subdirectory per version, named
//! with a lexically-sortable token (`0001`, `0002`, ...). Each version
//! directory holds up to three recognized scripts: `init.sql` (idempotent
//! schema/seed SQL, `-- GO`-delimited), `migration.js` (marker for a
//! programmatic step implemented as a registered [MigrationHandler]) and
//! `finalize.sql` (SQL run after the programmatic step). The engine scans
//! the root, plans the ordered subset of versions not yet applied, applies
//! each one's phases in order, and records every success in a version ledger
//! table.
//!
//! ## Example
//! ```
//! use migradir::{
//!     CancellationToken, MigrationEngine, MigrationSources, ScriptLocator, SqliteProvider,
//!     VersionScripts,
//! };
//! use rusqlite::Connection;
//!
//! // version directories are usually scanned from disk with
//! // `MigrationSources::from_filesystem`; inline scripts work the same way
//! let sources = MigrationSources::new()
//!     .with_version(
//!         "0001",
//!         VersionScripts {
//!             init: Some(ScriptLocator::Inline(
//!                 "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);\n\
//!                  -- GO\n\
//!                  INSERT INTO users VALUES (1, 'alice');"
//!                     .to_string(),
//!             )),
//!             ..Default::default()
//!         },
//!     )
//!     .with_version(
//!         "0002",
//!         VersionScripts {
//!             init: Some(ScriptLocator::Inline(
//!                 "ALTER TABLE users ADD COLUMN email TEXT;".to_string(),
//!             )),
//!             ..Default::default()
//!         },
//!     );
//!
//! // construct an engine over the sources
//! let engine = MigrationEngine::new(sources);
//!
//! // connect to your database and run the migration, receiving a report
//! let conn = Connection::open_in_memory().unwrap();
//! let token = CancellationToken::new();
//! let report = engine.install(&token, &SqliteProvider::new(&conn)).unwrap();
//! assert_eq!(report.versions_applied, vec!["0001", "0002"]);
//!
//! // re-running applies nothing: every version is recorded in the ledger
//! let report = engine
//!     .migrate(&token, &SqliteProvider::new(&conn), None)
//!     .unwrap();
//! assert!(report.versions_applied.is_empty());
//!
//! // assert the migration logic was applied to the database
//! let columns = {
//!     let mut stmt = conn.prepare("PRAGMA table_info(users)").unwrap();
//!     let columns = stmt
//!         .query_map([], |row| row.get::<_, String>(1))
//!         .unwrap()
//!         .collect::<Result<Vec<_>, _>>()
//!         .unwrap();
//!     columns
//! };
//! assert_eq!(columns, vec!["id", "name", "email"]);
//! ```
//!
//! ## Programmatic migration steps
//!
//! A version that needs host-language logic (read data, transform it, write
//! it back) registers a handler by version key at engine construction:
//!
//! ```
//! use migradir::{
//!     CancellationToken, Error, MigrationEngine, MigrationLog, MigrationSources, ScriptLocator,
//!     SqlProvider, VersionScripts,
//! };
//!
//! let sources = MigrationSources::new().with_version(
//!     "0001",
//!     VersionScripts {
//!         init: Some(ScriptLocator::Inline(
//!             "CREATE TABLE prefs (name TEXT PRIMARY KEY, value TEXT);".to_string(),
//!         )),
//!         migration: Some(ScriptLocator::Inline(String::new())),
//!         ..Default::default()
//!     },
//! );
//!
//! let engine = MigrationEngine::new(sources).with_handler(
//!     "0001",
//!     |token: &CancellationToken,
//!      provider: &dyn SqlProvider,
//!      log: &mut MigrationLog|
//!      -> Result<(), Error> {
//!         provider.execute(token, "INSERT INTO prefs VALUES ('scheme', 'dark')", &[])?;
//!         log.append("seeded default preferences");
//!         Ok(())
//!     },
//! );
//! # let conn = rusqlite::Connection::open_in_memory().unwrap();
//! # let token = migradir::CancellationToken::new();
//! # engine.install(&token, &migradir::SqliteProvider::new(&conn)).unwrap();
//! ```
//!
//! The handler's log output is captured into that version's ledger row.
//!
//! ## Failure semantics
//!
//! There are no down-migrations and no automatic rollback: a version that
//! fails partway leaves its already-committed statements in place, is not
//! recorded in the ledger, and is re-attempted from its `init` phase on the
//! next run. Write scripts idempotently (`CREATE TABLE IF NOT EXISTS`
//! style) so the replay is harmless, or wrap the run in an explicit
//! transaction scope via the provider's optional transaction capability.

mod cancellation;
mod engine;
mod error;
mod ledger;
mod planner;
mod sources;
mod splitter;

pub mod provider;
#[cfg(feature = "sqlite")]
pub mod testing;

pub use cancellation::CancellationToken;
pub use engine::{MigrationEngine, MigrationHandler, MigrationLog, MigrationReport};
pub use error::Error;
pub use ledger::{VersionLedger, DEFAULT_VERSION_TABLE_NAME};
pub use planner::plan;
pub use provider::{run_script, SqlData, SqlParam, SqlProvider, SqlRow, SqlValue};
#[cfg(feature = "sqlite")]
pub use provider::{new_database, open_database, SqliteProvider};
pub use sources::{
    MigrationSources, ScriptLocator, ScriptPhase, VersionScripts, FINALIZE_SCRIPT_FILENAME,
    INIT_SCRIPT_FILENAME, MIGRATION_SCRIPT_FILENAME,
};
pub use splitter::{split_script, Dialect};
