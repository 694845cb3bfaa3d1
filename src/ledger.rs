//! The version ledger: the bookkeeping table recording which versions have
//! been applied, when, and with what captured log output.
//!
//! Logical schema: `version` (string, primary key), `date_unix_deployed_at`
//! (integer Unix seconds, not null), `log` (text, not null). Rows are
//! append-only; the engine writes one row per fully-applied version and
//! never updates or deletes.

use chrono::Utc;

use crate::cancellation::CancellationToken;
use crate::error::Error;
use crate::provider::{run_script, SqlParam, SqlProvider};
use crate::splitter::Dialect;

/// Default name for the version ledger table.
pub const DEFAULT_VERSION_TABLE_NAME: &str = "_migradir_version_";

/// Bookkeeping-table operations over an injected [SqlProvider].
pub struct VersionLedger<'a> {
    provider: &'a dyn SqlProvider,
    table_name: &'a str,
}

impl<'a> VersionLedger<'a> {
    pub fn new(provider: &'a dyn SqlProvider, table_name: &'a str) -> Self {
        Self {
            provider,
            table_name,
        }
    }

    /// Whether the ledger table is present in the database.
    pub fn exists(&self, token: &CancellationToken) -> Result<bool, Error> {
        let probe = self.provider.scalar_or_null(
            token,
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[SqlParam::from(self.table_name)],
        )?;
        match probe {
            None => Ok(false),
            Some(data) => {
                if data.as_integer()? != 1 {
                    return Err(Error::Structural("unexpected SQL result".to_string()));
                }
                Ok(true)
            }
        }
    }

    /// Fail unless the ledger table is present.
    ///
    /// Column verification beyond existence would need schema introspection
    /// portable SQL does not give us, so existence is the binding check.
    pub fn verify_structure(&self, token: &CancellationToken) -> Result<(), Error> {
        if !self.exists(token)? {
            return Err(Error::Structural(format!(
                "the database does not have version table: {}",
                self.table_name
            )));
        }
        Ok(())
    }

    /// The lexically-maximum recorded version, or `None` if the table is
    /// absent or empty.
    pub fn get_current_version(&self, token: &CancellationToken) -> Result<Option<String>, Error> {
        if !self.exists(token)? {
            return Ok(None);
        }
        self.verify_structure(token)?;
        let version = self.provider.scalar_or_null(
            token,
            &format!(
                "SELECT version FROM {} ORDER BY version DESC LIMIT 1",
                self.table_name
            ),
            &[],
        )?;
        match version {
            None => Ok(None),
            Some(data) => Ok(Some(data.as_string()?.to_string())),
        }
    }

    /// Create the ledger table. Only permitted on a pristine database: if any
    /// table exists the operation fails with
    /// [Error::OperationNotAllowed](crate::Error::OperationNotAllowed), so an
    /// unrelated schema is never silently co-opted.
    pub fn create(&self, token: &CancellationToken) -> Result<(), Error> {
        let table_count = self
            .provider
            .scalar(
                token,
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                &[],
            )?
            .as_integer()?;
        if table_count != 0 {
            return Err(Error::OperationNotAllowed(format!(
                "the database has tables; creating version table {} is allowed only on an empty database",
                self.table_name
            )));
        }
        let ddl = format!(
            "CREATE TABLE {} (version VARCHAR(64) NOT NULL PRIMARY KEY, date_unix_deployed_at INTEGER NOT NULL, log TEXT NOT NULL);",
            self.table_name
        );
        run_script(token, self.provider, &ddl, Dialect::Semicolon)?;
        Ok(())
    }

    /// Append one ledger row for `version` with the current Unix timestamp.
    ///
    /// Never updates an existing row: the caller guarantees at-most-once per
    /// successfully applied version, and the primary key enforces it.
    pub fn record_applied(
        &self,
        token: &CancellationToken,
        version: &str,
        log_text: &str,
    ) -> Result<(), Error> {
        let deployed_at = Utc::now().timestamp();
        self.provider.execute(
            token,
            &format!(
                "INSERT INTO {} (version, date_unix_deployed_at, log) VALUES (?, ?, ?)",
                self.table_name
            ),
            &[
                SqlParam::from(version),
                SqlParam::from(deployed_at),
                SqlParam::from(log_text),
            ],
        )?;
        Ok(())
    }
}
