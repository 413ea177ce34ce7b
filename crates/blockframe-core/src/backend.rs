//! Statement execution port.
//!
//! The engine never owns a connection. It talks to a [`Backend`], which
//! executes SQL text, answers queries, and brackets work in transactions.
//! A backend also declares its [`Dialect`]; the dialect decides which bulk
//! update [`Profile`] the writer uses, and how identifiers are quoted.

#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::{Backtrace, prelude::*};
use tracing::{trace, warn};

use crate::value::Value;

/// One result row, in select-list order.
pub type Row = Vec<Value>;

/// Boxed driver error carried by [`BackendError::Driver`].
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by backends.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    /// The driver rejected or failed a statement.
    #[snafu(display("statement failed: {source} (sql: {statement})"))]
    Driver {
        /// The statement, truncated for display.
        statement: String,
        /// Underlying driver error.
        source: DriverError,
        /// Where the failure was wrapped.
        backtrace: Backtrace,
    },

    /// The backend does not implement the requested operation.
    #[snafu(display("backend does not support {operation}"))]
    Unsupported {
        /// What was attempted.
        operation: String,
    },
}

impl BackendError {
    /// Wrap a driver error, keeping at most a prefix of the statement text.
    pub fn driver(statement: &str, source: impl Into<DriverError>) -> Self {
        const MAX_LEN: usize = 240;
        let statement = match statement.char_indices().nth(MAX_LEN) {
            Some((cut, _)) => format!("{}...", &statement[..cut]),
            None => statement.to_string(),
        };
        BackendError::Driver {
            statement,
            source: source.into(),
            backtrace: Backtrace::capture(),
        }
    }
}

/// SQL dialect spoken by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    MySql,
    /// SQLite 3.33 or newer.
    Sqlite,
    /// Anything else; handled with the least capable strategy.
    Unknown(String),
}

impl Dialect {
    /// Map an adapter tag (`postgresql`, `mysql2`, `sqlite3`, ...) to a dialect.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Dialect::Postgres,
            "mysql" | "mysql2" | "mariadb" => Dialect::MySql,
            "sqlite" | "sqlite3" => Dialect::Sqlite,
            other => Dialect::Unknown(other.to_string()),
        }
    }

    /// Bulk update profile used when the backend does not override it.
    pub fn default_profile(&self) -> Profile {
        match self {
            Dialect::Postgres | Dialect::Sqlite => Profile::RowMerge,
            Dialect::MySql => Profile::Upsert,
            Dialect::Unknown(_) => Profile::CaseUpdate,
        }
    }

    /// Quote an identifier that has already passed layout validation.
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{name}`"),
            _ => format!("\"{name}\""),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => f.write_str("postgresql"),
            Dialect::MySql => f.write_str("mysql"),
            Dialect::Sqlite => f.write_str("sqlite"),
            Dialect::Unknown(tag) => f.write_str(tag),
        }
    }
}

impl From<String> for Dialect {
    fn from(tag: String) -> Self {
        Dialect::from_tag(&tag)
    }
}

impl From<Dialect> for String {
    fn from(dialect: Dialect) -> Self {
        dialect.to_string()
    }
}

/// Bulk update capability class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Profile A: join a literal row set against the table in one `UPDATE`.
    RowMerge,
    /// Profile B: one `INSERT` with an on-conflict overwrite clause.
    Upsert,
    /// Profile C: one `UPDATE ... CASE block_index` per touched column.
    CaseUpdate,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::RowMerge => f.write_str("row-merge"),
            Profile::Upsert => f.write_str("upsert"),
            Profile::CaseUpdate => f.write_str("case-update"),
        }
    }
}

impl FromStr for Profile {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "row-merge" | "a" => Ok(Profile::RowMerge),
            "upsert" | "b" => Ok(Profile::Upsert),
            "case-update" | "c" => Ok(Profile::CaseUpdate),
            other => UnsupportedSnafu {
                operation: format!("profile '{other}'"),
            }
            .fail(),
        }
    }
}

/// A complete SQL statement ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement(String);

impl Statement {
    pub(crate) fn new(sql: String) -> Self {
        Statement(sql)
    }

    /// SQL text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something that can run SQL inside transactions.
///
/// Implementations are driven from one worker at a time; methods take
/// `&self` so a backend can be shared by several frames of one database.
pub trait Backend {
    /// Declared dialect.
    fn dialect(&self) -> Dialect;

    /// Bulk update profile; defaults to the dialect's.
    fn profile(&self) -> Profile {
        self.dialect().default_profile()
    }

    /// Whether [`Backend::execute_script`] can run several `;`-separated
    /// statements in one call.
    fn supports_multi_statement(&self) -> bool {
        false
    }

    /// Execute one statement.
    fn execute(&self, sql: &str) -> Result<(), BackendError>;

    /// Execute several statements in one round trip.
    fn execute_script(&self, _script: &str) -> Result<(), BackendError> {
        UnsupportedSnafu {
            operation: "multi-statement execution",
        }
        .fail()
    }

    /// Run a query and collect every row.
    fn query(&self, sql: &str) -> Result<Vec<Row>, BackendError>;

    /// Open a transaction.
    fn begin(&self) -> Result<(), BackendError>;

    /// Commit the open transaction.
    fn commit(&self) -> Result<(), BackendError>;

    /// Roll back the open transaction.
    fn rollback(&self) -> Result<(), BackendError>;
}

/// Run `body` inside a transaction: commit when it succeeds, roll back when it
/// or the commit fails.
///
/// A rollback failure is logged and the earlier error is returned.
pub fn with_transaction<B, T, E>(backend: &B, body: impl FnOnce(&B) -> Result<T, E>) -> Result<T, E>
where
    B: Backend + ?Sized,
    E: From<BackendError> + fmt::Display,
{
    backend.begin()?;
    let err = match body(backend) {
        Ok(value) => match backend.commit() {
            Ok(()) => return Ok(value),
            Err(commit_err) => E::from(commit_err),
        },
        Err(err) => err,
    };
    // A failed COMMIT can leave the transaction open (SQLITE_BUSY).
    if let Err(rollback_err) = backend.rollback() {
        warn!(error = %rollback_err, original = %err, "rollback failed");
    }
    Err(err)
}

/// Execute `statements` on `backend` without opening a transaction.
///
/// Uses one script round trip when the backend supports it, otherwise one
/// call per statement.
pub fn run_statements<B>(backend: &B, statements: &[Statement]) -> Result<(), BackendError>
where
    B: Backend + ?Sized,
{
    match statements {
        [] => Ok(()),
        [single] => {
            trace!(sql = single.as_str(), "execute");
            backend.execute(single.as_str())
        }
        many if backend.supports_multi_statement() => {
            let script = many
                .iter()
                .map(Statement::as_str)
                .collect::<Vec<_>>()
                .join(";\n");
            trace!(statements = many.len(), sql = %script, "execute script");
            backend.execute_script(&script)
        }
        many => {
            for statement in many {
                trace!(sql = statement.as_str(), "execute");
                backend.execute(statement.as_str())?;
            }
            Ok(())
        }
    }
}
