//! The embedded-SQL-provider abstraction the engine runs against, and a
//! SQLite implementation of it over [rusqlite] (feature `sqlite`).
//!
//! The engine only ever sees `&dyn SqlProvider`, so tests (or another
//! backend) can substitute their own implementation. Statement placeholders
//! are positional `?` markers; an array-valued parameter expands into a
//! comma-separated run of markers at the marker's position, which is how
//! `IN (?)` lists are written.

use std::fmt;

use crate::cancellation::CancellationToken;
use crate::error::Error;
use crate::splitter::{split_script, Dialect};

/// A value read from or bound into a SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(t) => write!(f, "{}", t),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// A scalar result cell: a value plus the column it came from, so that
/// wrong-type access can name the offending field.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlData {
    column: String,
    value: SqlValue,
}

impl SqlData {
    pub fn new(column: impl Into<String>, value: SqlValue) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, SqlValue::Null)
    }

    fn wrong_type(&self, requested: &'static str) -> Error {
        Error::InvalidConversion {
            column: self.column.clone(),
            requested,
        }
    }

    /// Integer zero is false, any other integer is true.
    pub fn as_bool(&self) -> Result<bool, Error> {
        match self.value {
            SqlValue::Integer(i) => Ok(i != 0),
            _ => Err(self.wrong_type("boolean")),
        }
    }

    pub fn as_nullable_bool(&self) -> Result<Option<bool>, Error> {
        match self.value {
            SqlValue::Null => Ok(None),
            _ => self.as_bool().map(Some),
        }
    }

    pub fn as_string(&self) -> Result<&str, Error> {
        match &self.value {
            SqlValue::Text(t) => Ok(t),
            _ => Err(self.wrong_type("string")),
        }
    }

    pub fn as_nullable_string(&self) -> Result<Option<&str>, Error> {
        match &self.value {
            SqlValue::Null => Ok(None),
            _ => self.as_string().map(Some),
        }
    }

    pub fn as_integer(&self) -> Result<i64, Error> {
        match self.value {
            SqlValue::Integer(i) => Ok(i),
            _ => Err(self.wrong_type("integer")),
        }
    }

    pub fn as_nullable_integer(&self) -> Result<Option<i64>, Error> {
        match self.value {
            SqlValue::Null => Ok(None),
            _ => self.as_integer().map(Some),
        }
    }

    /// Any numeric value as a float.
    pub fn as_real(&self) -> Result<f64, Error> {
        match self.value {
            SqlValue::Real(r) => Ok(r),
            SqlValue::Integer(i) => Ok(i as f64),
            _ => Err(self.wrong_type("real")),
        }
    }

    pub fn as_nullable_real(&self) -> Result<Option<f64>, Error> {
        match self.value {
            SqlValue::Null => Ok(None),
            _ => self.as_real().map(Some),
        }
    }

    pub fn as_blob(&self) -> Result<&[u8], Error> {
        match &self.value {
            SqlValue::Blob(b) => Ok(b),
            _ => Err(self.wrong_type("binary")),
        }
    }

    pub fn as_nullable_blob(&self) -> Result<Option<&[u8]>, Error> {
        match &self.value {
            SqlValue::Null => Ok(None),
            _ => self.as_blob().map(Some),
        }
    }
}

/// One result row, preserving column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow {
    cells: Vec<SqlData>,
}

impl SqlRow {
    pub fn new(cells: Vec<SqlData>) -> Self {
        Self { cells }
    }

    pub fn get(&self, column: &str) -> Result<&SqlData, Error> {
        self.cells
            .iter()
            .find(|c| c.column() == column)
            .ok_or_else(|| Error::Generic(format!("no column named '{}' in result row", column)))
    }

    pub fn get_index(&self, index: usize) -> Result<&SqlData, Error> {
        self.cells
            .get(index)
            .ok_or_else(|| Error::Generic(format!("no column at index {} in result row", index)))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A positional statement parameter. A `List` expands into a comma-separated
/// run of `?` markers at its marker's position.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Value(SqlValue),
    List(Vec<SqlValue>),
}

impl From<SqlValue> for SqlParam {
    fn from(value: SqlValue) -> Self {
        SqlParam::Value(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Value(SqlValue::Integer(value))
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Value(SqlValue::Real(value))
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Value(SqlValue::Text(value.to_string()))
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Value(SqlValue::Text(value))
    }
}

impl From<Vec<u8>> for SqlParam {
    fn from(value: Vec<u8>) -> Self {
        SqlParam::Value(SqlValue::Blob(value))
    }
}

impl From<Vec<SqlValue>> for SqlParam {
    fn from(values: Vec<SqlValue>) -> Self {
        SqlParam::List(values)
    }
}

/// The capability surface the migration engine consumes.
///
/// `begin_transaction`/`commit_transaction`/`rollback_transaction` are an
/// optional capability: the engine never calls them itself (a
/// partially-applied version is left as-is), but callers wanting atomicity
/// can wrap `install`/`migrate` in an explicit transaction scope when the
/// provider supports one.
pub trait SqlProvider {
    fn execute(
        &self,
        token: &CancellationToken,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<usize, Error>;

    fn query(
        &self,
        token: &CancellationToken,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Vec<SqlRow>, Error>;

    /// First column of the first result row; fails if the query returns no rows.
    fn scalar(
        &self,
        token: &CancellationToken,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<SqlData, Error> {
        match self.scalar_or_null(token, sql, params)? {
            Some(data) => Ok(data),
            None => Err(Error::Generic(
                "underlying SQL provider returned not enough data to complete the request"
                    .to_string(),
            )),
        }
    }

    /// First column of the first result row, or `None` if the query returned
    /// no rows at all. A row holding a SQL NULL is `Some` with a null value.
    fn scalar_or_null(
        &self,
        token: &CancellationToken,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<SqlData>, Error> {
        let rows = self.query(token, sql, params)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.get_index(0)?.clone())),
            None => Ok(None),
        }
    }

    fn begin_transaction(&self, _token: &CancellationToken) -> Result<(), Error> {
        Err(Error::Generic(
            "transactions are not supported by this provider".to_string(),
        ))
    }

    fn commit_transaction(&self, _token: &CancellationToken) -> Result<(), Error> {
        Err(Error::Generic(
            "transactions are not supported by this provider".to_string(),
        ))
    }

    fn rollback_transaction(&self, _token: &CancellationToken) -> Result<(), Error> {
        Err(Error::Generic(
            "transactions are not supported by this provider".to_string(),
        ))
    }
}

/// Split `script` under `dialect` and execute each statement in order,
/// stopping at the first failure. Returns the number of statements executed.
///
/// A failing statement is surfaced as
/// [Error::Statement](crate::Error::Statement), carrying the offending
/// statement text alongside the driver error.
pub fn run_script(
    token: &CancellationToken,
    provider: &dyn SqlProvider,
    script: &str,
    dialect: Dialect,
) -> Result<usize, Error> {
    let statements = split_script(token, script, dialect)?;
    let mut executed = 0;
    for statement in &statements {
        token.check()?;
        provider
            .execute(token, statement, &[])
            .map_err(|e| match e {
                Error::Cancelled => Error::Cancelled,
                other => Error::Statement {
                    statement: statement.clone(),
                    source: Box::new(other),
                },
            })?;
        executed += 1;
    }
    Ok(executed)
}

/// Expand `?` markers against the parameter list: a [SqlParam::Value]
/// consumes one marker as-is, a [SqlParam::List] of k values rewrites its
/// marker into k comma-separated markers. Markers inside single-quoted
/// literals are left alone. Marker and parameter counts must match.
fn expand_markers(sql: &str, params: &[SqlParam]) -> Result<(String, Vec<SqlValue>), Error> {
    let mut rewritten = String::with_capacity(sql.len());
    let mut values: Vec<SqlValue> = Vec::with_capacity(params.len());
    let mut next_param = params.iter();
    let mut in_string = false;

    for ch in sql.chars() {
        match ch {
            // a doubled '' inside a literal toggles twice, which is harmless
            '\'' => {
                in_string = !in_string;
                rewritten.push(ch);
            }
            '?' if !in_string => match next_param.next() {
                Some(SqlParam::Value(value)) => {
                    rewritten.push('?');
                    values.push(value.clone());
                }
                Some(SqlParam::List(list)) => {
                    let markers: Vec<&str> = list.iter().map(|_| "?").collect();
                    rewritten.push_str(&markers.join(", "));
                    values.extend(list.iter().cloned());
                }
                None => {
                    return Err(Error::Generic(
                        "statement has more `?` markers than supplied parameters".to_string(),
                    ))
                }
            },
            _ => rewritten.push(ch),
        }
    }

    if next_param.next().is_some() {
        return Err(Error::Generic(
            "statement has fewer `?` markers than supplied parameters".to_string(),
        ));
    }

    Ok((rewritten, values))
}

#[cfg(feature = "sqlite")]
pub use sqlite::{new_database, open_database, SqliteProvider};

#[cfg(feature = "sqlite")]
mod sqlite {
    use std::path::Path;

    use rusqlite::types::{ToSqlOutput, Value, ValueRef};
    use rusqlite::Connection;

    use super::{expand_markers, run_script, SqlData, SqlParam, SqlProvider, SqlRow, SqlValue};
    use crate::cancellation::CancellationToken;
    use crate::error::Error;
    use crate::sources::ScriptLocator;
    use crate::splitter::Dialect;

    impl rusqlite::ToSql for SqlValue {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            Ok(match self {
                SqlValue::Null => ToSqlOutput::Owned(Value::Null),
                SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
                SqlValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
                SqlValue::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
                SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            })
        }
    }

    fn decode(value: ValueRef<'_>) -> SqlValue {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(r) => SqlValue::Real(r),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }

    /// [SqlProvider] over a borrowed [rusqlite::Connection].
    ///
    /// The connection is owned by the caller for the duration of one
    /// engine operation and must be released by the caller on all exit
    /// paths, including failure.
    pub struct SqliteProvider<'a> {
        conn: &'a Connection,
    }

    impl<'a> SqliteProvider<'a> {
        pub fn new(conn: &'a Connection) -> Self {
            Self { conn }
        }
    }

    impl SqlProvider for SqliteProvider<'_> {
        fn execute(
            &self,
            token: &CancellationToken,
            sql: &str,
            params: &[SqlParam],
        ) -> Result<usize, Error> {
            token.check()?;
            let (sql, values) = expand_markers(sql, params)?;
            let mut stmt = self.conn.prepare(&sql)?;
            let changed = stmt.execute(rusqlite::params_from_iter(values.iter()))?;
            Ok(changed)
        }

        fn query(
            &self,
            token: &CancellationToken,
            sql: &str,
            params: &[SqlParam],
        ) -> Result<Vec<SqlRow>, Error> {
            token.check()?;
            let (sql, values) = expand_markers(sql, params)?;
            let mut stmt = self.conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let mut rows = stmt.query(rusqlite::params_from_iter(values.iter()))?;
            let mut result = Vec::new();
            while let Some(row) = rows.next()? {
                let mut cells = Vec::with_capacity(columns.len());
                for (index, column) in columns.iter().enumerate() {
                    cells.push(SqlData::new(column.clone(), decode(row.get_ref(index)?)));
                }
                result.push(SqlRow::new(cells));
            }
            Ok(result)
        }

        fn begin_transaction(&self, token: &CancellationToken) -> Result<(), Error> {
            token.check()?;
            self.conn.execute_batch("BEGIN")?;
            Ok(())
        }

        fn commit_transaction(&self, token: &CancellationToken) -> Result<(), Error> {
            token.check()?;
            self.conn.execute_batch("COMMIT")?;
            Ok(())
        }

        fn rollback_transaction(&self, token: &CancellationToken) -> Result<(), Error> {
            token.check()?;
            self.conn.execute_batch("ROLLBACK")?;
            Ok(())
        }
    }

    /// Open an existing database file. Fails if the file does not exist, so a
    /// typo'd path is not silently materialized as an empty database.
    pub fn open_database(path: impl AsRef<Path>) -> Result<Connection, Error> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::Generic(format!(
                "database file {} does not exist",
                path.display()
            )));
        }
        Ok(Connection::open(path)?)
    }

    /// Create a new database file, optionally running a `-- GO`-delimited
    /// init script loaded from `init_script`. Fails if the file already
    /// exists.
    pub fn new_database(
        token: &CancellationToken,
        path: impl AsRef<Path>,
        init_script: Option<&ScriptLocator>,
    ) -> Result<Connection, Error> {
        token.check()?;
        let path = path.as_ref();
        if path.exists() {
            return Err(Error::OperationNotAllowed(format!(
                "database file {} already exists",
                path.display()
            )));
        }
        let conn = Connection::open(path)?;
        if let Some(locator) = init_script {
            let script = locator.load(token)?;
            run_script(token, &SqliteProvider::new(&conn), &script, Dialect::Go)?;
        }
        Ok(conn)
    }
}
