//! SQLite adapter over `rusqlite`.
//!
//! SQLite 3.33+ understands `UPDATE .. FROM`, so the adapter declares
//! [`Profile::RowMerge`] by default. The profile and the multi-statement
//! capability can be overridden, which lets one embedded database exercise
//! every bulk strategy.

use std::{cell::Cell, path::Path};

use rusqlite::{Connection, types::ValueRef};
use tracing::debug;

use super::{Backend, BackendError, Dialect, Profile, Row};
use crate::value::Value;

/// A [`Backend`] backed by one SQLite connection.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
    profile: Profile,
    multi_statement: bool,
    round_trips: Cell<u64>,
}

impl SqliteBackend {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| BackendError::driver("<open>", e))?;
        debug!(path = %path.display(), "opened sqlite database");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory().map_err(|e| BackendError::driver("<open>", e))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            profile: Dialect::Sqlite.default_profile(),
            multi_statement: true,
            round_trips: Cell::new(0),
        }
    }

    /// Use `profile` for bulk updates instead of the dialect default.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Enable or disable multi-statement scripts.
    pub fn with_multi_statement(mut self, enabled: bool) -> Self {
        self.multi_statement = enabled;
        self
    }

    /// Number of statements or scripts sent to SQLite so far, transaction
    /// control included.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.get()
    }

    /// Underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn batch(&self, sql: &str) -> Result<(), BackendError> {
        self.round_trips.set(self.round_trips.get() + 1);
        self.conn
            .execute_batch(sql)
            .map_err(|e| BackendError::driver(sql, e))
    }
}

impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn profile(&self) -> Profile {
        self.profile
    }

    fn supports_multi_statement(&self) -> bool {
        self.multi_statement
    }

    fn execute(&self, sql: &str) -> Result<(), BackendError> {
        self.batch(sql)
    }

    fn execute_script(&self, script: &str) -> Result<(), BackendError> {
        if !self.multi_statement {
            return super::UnsupportedSnafu {
                operation: "multi-statement execution",
            }
            .fail();
        }
        self.batch(script)
    }

    fn query(&self, sql: &str) -> Result<Vec<Row>, BackendError> {
        self.round_trips.set(self.round_trips.get() + 1);
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| BackendError::driver(sql, e))?;
        let width = stmt.column_count();
        let mut rows = stmt.query([]).map_err(|e| BackendError::driver(sql, e))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| BackendError::driver(sql, e))? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                let cell = row.get_ref(i).map_err(|e| BackendError::driver(sql, e))?;
                cells.push(value_from_ref(cell));
            }
            out.push(cells);
        }
        Ok(out)
    }

    fn begin(&self) -> Result<(), BackendError> {
        self.batch("BEGIN")
    }

    fn commit(&self) -> Result<(), BackendError> {
        self.batch("COMMIT")
    }

    fn rollback(&self) -> Result<(), BackendError> {
        self.batch("ROLLBACK")
    }
}

fn value_from_ref(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_maps_storage_classes() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let rows = db.query("SELECT NULL, 3, 2.5, 'x'").unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Value::Null,
                Value::Int(3),
                Value::Float(2.5),
                Value::Text("x".to_string())
            ]]
        );
    }

    #[test]
    fn rollback_discards_work() {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (v INTEGER)").unwrap();
        db.begin().unwrap();
        db.execute("INSERT INTO t VALUES (1)").unwrap();
        db.rollback().unwrap();
        assert!(db.query("SELECT v FROM t").unwrap().is_empty());
    }

    #[test]
    fn scripts_run_in_one_round_trip() {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.execute_script("CREATE TABLE t (v INTEGER);\nINSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2)")
            .unwrap();
        assert_eq!(db.round_trips(), 1);
        assert_eq!(db.query("SELECT count(*) FROM t").unwrap(), vec![vec![Value::Int(2)]]);
    }

    #[test]
    fn scripts_can_be_disabled() {
        let db = SqliteBackend::open_in_memory()
            .unwrap()
            .with_multi_statement(false)
            .with_profile(Profile::CaseUpdate);
        assert!(!db.supports_multi_statement());
        assert_eq!(db.profile(), Profile::CaseUpdate);
        assert!(matches!(
            db.execute_script("SELECT 1; SELECT 2"),
            Err(BackendError::Unsupported { .. })
        ));
    }

    #[test]
    fn driver_errors_carry_the_statement() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let err = db.execute("SELEC 1").unwrap_err();
        assert!(err.to_string().contains("SELEC 1"));
    }
}
