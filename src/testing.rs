//! Testing utilities for migration development and verification.
//!
//! This module provides a test harness for writing migration tests against
//! an in-memory SQLite database: state control (install / migrate to a
//! target), assertion helpers, and schema snapshotting for comparing the
//! result of a migration run against a manually constructed schema.

use std::collections::HashMap;

use rusqlite::types::FromSql;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationToken;
use crate::engine::{MigrationEngine, MigrationReport};
use crate::error::Error;
use crate::provider::SqliteProvider;

/// A test harness holding an engine and a database connection together.
///
/// # Example
/// ```
/// use migradir::testing::MigrationTestHarness;
/// use migradir::{MigrationEngine, MigrationSources, ScriptLocator, VersionScripts};
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
/// let mut harness = MigrationTestHarness::new(MigrationEngine::new(sources));
///
/// harness.install().unwrap();
/// harness.assert_table_exists("users").unwrap();
/// harness.execute("INSERT INTO users VALUES (1, 'alice')").unwrap();
/// let name: String = harness.query_one("SELECT name FROM users WHERE id = 1").unwrap();
/// assert_eq!(name, "alice");
/// ```
pub struct MigrationTestHarness {
    conn: Connection,
    engine: MigrationEngine,
    token: CancellationToken,
}

/// A captured database schema for comparison and snapshotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Map of table name to table definition.
    pub tables: HashMap<String, TableSchema>,
}

/// A table's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// SQL CREATE statement for the table.
    pub sql: String,
    /// List of columns.
    pub columns: Vec<ColumnInfo>,
    /// List of named indexes.
    pub indexes: Vec<IndexInfo>,
}

/// Information about a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// Information about an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub sql: String,
}

impl MigrationTestHarness {
    /// Create a harness over an in-memory SQLite database.
    ///
    /// The engine should be the same one used in the production environment,
    /// typically built by a shared constructor function, so asserts against
    /// previous versions keep holding as new versions are added.
    pub fn new(engine: MigrationEngine) -> Self {
        let conn = Connection::open_in_memory().expect("Failed to create in-memory test database");
        Self::with_connection(conn, engine)
    }

    /// Create a harness with a custom connection, for file-based databases
    /// or custom settings.
    pub fn with_connection(conn: Connection, engine: MigrationEngine) -> Self {
        Self {
            conn,
            engine,
            token: CancellationToken::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Apply every discovered version.
    pub fn install(&mut self) -> Result<MigrationReport, Error> {
        self.engine
            .install(&self.token, &SqliteProvider::new(&self.conn))
    }

    /// Migrate up to and including `target`.
    ///
    /// Fails if the target version is not among the discovered versions.
    pub fn migrate_to(&mut self, target: &str) -> Result<MigrationReport, Error> {
        if self.engine.sources().scripts(target).is_none() {
            return Err(Error::Generic(format!(
                "version {} does not exist. Available versions: {}",
                target,
                self.engine
                    .sources()
                    .versions()
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        self.engine
            .migrate(&self.token, &SqliteProvider::new(&self.conn), Some(target))
    }

    /// The engine's view of the database's current version.
    pub fn current_version(&self) -> Result<Option<String>, Error> {
        self.engine
            .get_current_version(&self.token, &SqliteProvider::new(&self.conn))
    }

    /// Versions recorded in the ledger, in lexical order. Empty when the
    /// ledger table does not exist yet.
    pub fn applied_versions(&self) -> Result<Vec<String>, Error> {
        let table_exists = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")?
            .query([self.engine.version_table_name()])?
            .next()?
            .is_some();
        if !table_exists {
            return Ok(vec![]);
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT version FROM {} ORDER BY version",
            self.engine.version_table_name()
        ))?;
        let versions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(versions)
    }

    /// Execute a single SQL statement, e.g. to seed test data.
    pub fn execute(&self, sql: &str) -> Result<usize, Error> {
        Ok(self.conn.execute(sql, [])?)
    }

    /// Run a query expected to return a single value.
    pub fn query_one<T: FromSql>(&self, sql: &str) -> Result<T, Error> {
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }

    pub fn assert_table_exists(&self, table: &str) -> Result<(), Error> {
        if !self.table_exists(table)? {
            return Err(Error::Generic(format!(
                "expected table '{}' to exist, but it does not",
                table
            )));
        }
        Ok(())
    }

    pub fn assert_table_not_exists(&self, table: &str) -> Result<(), Error> {
        if self.table_exists(table)? {
            return Err(Error::Generic(format!(
                "expected table '{}' to not exist, but it does",
                table
            )));
        }
        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<bool, Error> {
        Ok(self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")?
            .query([table])?
            .next()?
            .is_some())
    }

    /// Capture the full user-visible schema: every table (except SQLite
    /// internals and the version ledger), its columns and named indexes.
    pub fn snapshot_schema(&self) -> Result<SchemaSnapshot, Error> {
        let mut tables = HashMap::new();
        let table_defs: Vec<(String, String)> = self
            .conn
            .prepare(
                "SELECT name, sql FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != ?1",
            )?
            .query_map([self.engine.version_table_name()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (name, sql) in table_defs {
            let columns = self
                .conn
                .prepare(&format!("PRAGMA table_info({})", name))?
                .query_map([], |row| {
                    Ok(ColumnInfo {
                        name: row.get(1)?,
                        type_name: row.get(2)?,
                        not_null: row.get::<_, i64>(3)? != 0,
                        default_value: row.get(4)?,
                        primary_key: row.get::<_, i64>(5)? != 0,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            // named indexes only: auto-indexes carry no SQL to compare
            let indexes = self
                .conn
                .prepare(
                    "SELECT name, sql FROM sqlite_master
                     WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL",
                )?
                .query_map([&name], |row| {
                    let sql: String = row.get(1)?;
                    Ok(IndexInfo {
                        name: row.get(0)?,
                        unique: sql.to_uppercase().contains("UNIQUE"),
                        sql,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            tables.insert(name, TableSchema { sql, columns, indexes });
        }

        Ok(SchemaSnapshot { tables })
    }
}
