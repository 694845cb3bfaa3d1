//! Splits a raw SQL script into individually executable statements.
//!
//! Two statement-boundary conventions are in use: user-facing init/finalize
//! scripts delimit batches with `-- GO` comment lines, while internally
//! generated DDL terminates every statement with a trailing semicolon. Both
//! are handled by [split_script], selected by [Dialect].

use crate::cancellation::CancellationToken;
use crate::error::Error;

/// Statement-boundary convention for [split_script].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Line-oriented batches. Lines are joined with `\n`, preserving embedded
    /// semicolons inside a multi-line statement. A line beginning with `--` is
    /// a comment and is dropped, unless it begins with the batch separator
    /// `-- GO`, which flushes the accumulated statement. The separator is only
    /// recognized at the start of a line, so it can never split a quoted
    /// string; a data line must not begin with the reserved prefix (documented
    /// limitation, not validated).
    Go,
    /// Naive semicolon termination, used for internally generated DDL. Lines
    /// are concatenated with no join separator and the statement is flushed as
    /// soon as it ends with `;`. Statements are expected to break across lines
    /// only at token boundaries.
    Semicolon,
}

/// Split `script` into executable statements under the given [Dialect].
///
/// A script with zero statements (empty, or comments and blank lines only)
/// yields an empty vector, not an error. Cancellation is observed while
/// draining lines; once raised the operation fails with
/// [Error::Cancelled](crate::Error::Cancelled) and partial output is
/// discarded.
///
/// # Example
/// ```
/// use migradir::{split_script, CancellationToken, Dialect};
///
/// let script = "CREATE TABLE a (id INTEGER);\n-- GO\nINSERT INTO a VALUES (1)\n";
/// let statements = split_script(&CancellationToken::new(), script, Dialect::Go).unwrap();
/// assert_eq!(
///     statements,
///     vec!["CREATE TABLE a (id INTEGER);", "INSERT INTO a VALUES (1)"]
/// );
/// ```
pub fn split_script(
    token: &CancellationToken,
    script: &str,
    dialect: Dialect,
) -> Result<Vec<String>, Error> {
    let mut statements: Vec<String> = Vec::new();
    let mut buffer = String::new();

    let mut flush = |buffer: &mut String| {
        let trimmed = buffer.trim();
        if !trimmed.is_empty() {
            statements.push(trimmed.to_string());
        }
        buffer.clear();
    };

    for line in script.lines() {
        token.check()?;
        if line.trim().is_empty() {
            continue;
        }
        match dialect {
            Dialect::Go => {
                if line.starts_with("--") {
                    if line.starts_with("-- GO") {
                        flush(&mut buffer);
                    }
                } else {
                    if !buffer.is_empty() {
                        buffer.push('\n');
                    }
                    buffer.push_str(line);
                }
            }
            Dialect::Semicolon => {
                if line.starts_with("--") {
                    continue;
                }
                buffer.push_str(line);
                if buffer.trim_end().ends_with(';') {
                    flush(&mut buffer);
                }
            }
        }
    }
    token.check()?;
    flush(&mut buffer);

    Ok(statements)
}
