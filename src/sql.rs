//! SQL convenience helper.
//!
//! A thin facade over rusqlite: execute a parameterized statement and
//! either return the update count or stream each row through a
//! caller-supplied mapper, collecting results into an ordered Vec.
//! The caller owns the [`Connection`] and its lifecycle; there is no
//! pooling and no transaction management here.
//!
//! Argument binding goes through [`SqlValue`], which special-cases
//! symbolic values (bound by name as text), timestamps (bound through
//! the engine's native temporal representation) and null.

use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use rusqlite::{params_from_iter, Connection, Row};
use thiserror::Error;

/// Failure while preparing or executing a statement. Terminal for the
/// call; no partial results are returned.
#[derive(Debug, Error)]
pub enum SqlError {
    #[error("statement failed")]
    Statement(#[from] rusqlite::Error),
}

/// A bindable statement argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
    /// An enumerated value, bound by its name as text.
    Symbol(String),
    /// A point in time, bound through the engine's temporal type.
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Bind an enumerated value by name.
    pub fn symbol(name: impl Into<String>) -> Self {
        SqlValue::Symbol(name.into())
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            SqlValue::Integer(i) => Ok(ToSqlOutput::Owned(Value::Integer(*i))),
            SqlValue::Real(r) => Ok(ToSqlOutput::Owned(Value::Real(*r))),
            SqlValue::Text(s) => s.to_sql(),
            SqlValue::Blob(b) => b.to_sql(),
            SqlValue::Bool(b) => Ok(ToSqlOutput::Owned(Value::Integer(i64::from(*b)))),
            SqlValue::Symbol(name) => name.to_sql(),
            SqlValue::Timestamp(ts) => ts.to_sql(),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(value) => value.into(),
            None => SqlValue::Null,
        }
    }
}

/// Execute a statement and return the number of affected rows.
pub fn update(conn: &Connection, sql: &str, args: &[SqlValue]) -> Result<usize, SqlError> {
    Ok(conn.execute(sql, params_from_iter(args.iter()))?)
}

/// Execute a query and map every row, in order, into a Vec.
/// All-or-nothing: a row that fails to map fails the whole call.
pub fn select<T, F>(
    conn: &Connection,
    sql: &str,
    args: &[SqlValue],
    mut mapper: F,
) -> Result<Vec<T>, SqlError>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| mapper(row))?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Execute a query and map the first row, or None when the result set
/// is empty.
pub fn select_first<T, F>(
    conn: &Connection,
    sql: &str,
    args: &[SqlValue],
    mapper: F,
) -> Result<Option<T>, SqlError>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    Ok(select(conn, sql, args, mapper)?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory database");
        update(
            &conn,
            "create table person (id integer, name varchar(30), age integer)",
            &[],
        )
        .expect("create table");
        conn
    }

    #[test]
    fn update_returns_affected_count() {
        let conn = test_conn();
        let n = update(
            &conn,
            "insert into person (id, name, age) values (?, ?, ?)",
            &[1.into(), "James".into(), 29.into()],
        )
        .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn select_maps_rows_in_order() {
        let conn = test_conn();
        for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
            update(
                &conn,
                "insert into person (id, name, age) values (?, ?, ?)",
                &[id.into(), name.into(), SqlValue::Null],
            )
            .unwrap();
        }
        let names = select(
            &conn,
            "select name from person order by id",
            &[],
            |row| row.get::<_, String>(0),
        )
        .unwrap();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn select_first_returns_none_on_empty() {
        let conn = test_conn();
        let result = select_first(&conn, "select name from person", &[], |row| {
            row.get::<_, String>(0)
        })
        .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn null_and_symbol_bindings() {
        let conn = test_conn();
        update(
            &conn,
            "insert into person (id, name, age) values (?, ?, ?)",
            &[1.into(), SqlValue::symbol("ADMIN"), None::<i64>.into()],
        )
        .unwrap();
        let row = select_first(&conn, "select name, age from person", &[], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
        })
        .unwrap()
        .unwrap();
        assert_eq!(row, ("ADMIN".to_string(), None));
    }

    #[test]
    fn timestamp_binding_roundtrips() {
        let conn = test_conn();
        update(&conn, "create table event (at text)", &[]).unwrap();
        let at: DateTime<Utc> = "2011-06-01T10:00:00Z".parse().unwrap();
        update(&conn, "insert into event (at) values (?)", &[at.into()]).unwrap();
        let read = select_first(&conn, "select at from event", &[], |row| {
            row.get::<_, DateTime<Utc>>(0)
        })
        .unwrap()
        .unwrap();
        assert_eq!(read, at);
    }

    #[test]
    fn statement_errors_surface() {
        let conn = test_conn();
        assert!(update(&conn, "not valid sql", &[]).is_err());
    }
}
