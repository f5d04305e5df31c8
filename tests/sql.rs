//! Tests for the SQL helper against an in-memory SQLite database.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use xmlnode::sql::{self, SqlValue};

fn person_table() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory database");
    sql::update(
        &conn,
        "create table person (id integer, name varchar(30), age integer)",
        &[],
    )
    .expect("create table");
    conn
}

#[test]
fn basic_usage() {
    let conn = person_table();
    let inserted = sql::update(
        &conn,
        "insert into person (id, name, age) values (?, ?, ?)",
        &[1.into(), "James".into(), 29.into()],
    )
    .unwrap();
    assert_eq!(inserted, 1);

    let name = sql::select_first(&conn, "select * from person", &[], |row| {
        row.get::<_, String>("name")
    })
    .unwrap();
    assert_eq!(name.as_deref(), Some("James"));
}

#[test]
fn select_maps_every_row_in_order() {
    let conn = person_table();
    for (id, name, age) in [(1, "a", 10), (2, "b", 20), (3, "c", 30)] {
        sql::update(
            &conn,
            "insert into person (id, name, age) values (?, ?, ?)",
            &[id.into(), name.into(), age.into()],
        )
        .unwrap();
    }

    #[derive(Debug, PartialEq)]
    struct Person {
        name: String,
        age: i64,
    }

    let people = sql::select(
        &conn,
        "select name, age from person where age >= ? order by id",
        &[20.into()],
        |row| {
            Ok(Person {
                name: row.get(0)?,
                age: row.get(1)?,
            })
        },
    )
    .unwrap();
    assert_eq!(
        people,
        vec![
            Person {
                name: "b".to_string(),
                age: 20
            },
            Person {
                name: "c".to_string(),
                age: 30
            },
        ]
    );
}

#[test]
fn empty_result_sets_are_empty_not_errors() {
    let conn = person_table();
    let rows = sql::select(&conn, "select * from person", &[], |row| {
        row.get::<_, i64>("id")
    })
    .unwrap();
    assert!(rows.is_empty());
    let first = sql::select_first(&conn, "select * from person", &[], |row| {
        row.get::<_, i64>("id")
    })
    .unwrap();
    assert!(first.is_none());
}

#[test]
fn special_case_bindings() {
    let conn = person_table();
    sql::update(&conn, "create table extra (role text, at text, note text)", &[]).unwrap();

    let at: DateTime<Utc> = "2011-06-01T10:00:00Z".parse().unwrap();
    sql::update(
        &conn,
        "insert into extra (role, at, note) values (?, ?, ?)",
        &[SqlValue::symbol("ADMIN"), at.into(), SqlValue::Null],
    )
    .unwrap();

    let row = sql::select_first(&conn, "select role, at, note from extra", &[], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, DateTime<Utc>>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })
    .unwrap()
    .unwrap();

    assert_eq!(row.0, "ADMIN");
    assert_eq!(row.1, at);
    assert_eq!(row.2, None);
}

#[test]
fn update_returns_affected_row_count() {
    let conn = person_table();
    for id in 0..4 {
        sql::update(
            &conn,
            "insert into person (id, name, age) values (?, ?, ?)",
            &[id.into(), "x".into(), (id * 10).into()],
        )
        .unwrap();
    }
    let changed = sql::update(
        &conn,
        "update person set name = ? where age >= ?",
        &["grown".into(), 20.into()],
    )
    .unwrap();
    assert_eq!(changed, 2);
}

#[test]
fn failed_statements_surface_as_errors() {
    let conn = person_table();
    assert!(sql::update(&conn, "insert into missing values (1)", &[]).is_err());
    assert!(sql::select(&conn, "select nope from person", &[], |row| row
        .get::<_, i64>(0))
    .is_err());
}
