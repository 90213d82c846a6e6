use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use sql_conduit::mapping::required;
use sql_conduit::prelude::*;
use tempfile::TempDir;

#[derive(Debug, PartialEq)]
struct Book {
    id: i64,
    title: String,
    year: i32,
    in_print: bool,
}

impl FromRow for Book {
    fn from_row(row: &Row) -> Result<Self, SqlConduitError> {
        Ok(Book {
            id: required(row, "id", Row::get_i64)?,
            title: required(row, "TITLE", Row::get_string)?,
            year: required(row, "year", Row::get_i32)?,
            in_print: row.get_bool("in_print").unwrap_or(false),
        })
    }
}

fn library(dir: &TempDir, pool_size: usize) -> Dao {
    let config = ConduitConfig {
        connector: ConnectorOptions::new(
            dir.path().join("library.db").to_string_lossy().into_owned(),
        ),
        pool: PoolOptions::new(pool_size),
    };
    let pool = config.build_pool().unwrap();
    pool.get_connection_and(|conn| {
        conn.execute_batch(
            "CREATE TABLE books (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                year INTEGER NOT NULL,
                in_print INTEGER NOT NULL DEFAULT 1
            );",
        )?;
        conn.get_update_batch(
            "INSERT INTO books (title, year, in_print) VALUES (?1, ?2, ?3)",
            &[
                vec!["Dune".into(), 1965.into(), true.into()],
                vec!["Solaris".into(), 1961.into(), false.into()],
                vec!["Hyperion".into(), 1989.into(), true.into()],
            ],
        )?;
        Ok::<_, SqlConduitError>(())
    })
    .unwrap();
    Dao::new(pool)
}

#[test]
fn connector_reports_unreachable_database() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no/such/dir/db.sqlite");
    let connector = Connector::new(SqliteDriver::new(), missing.to_string_lossy().into_owned());
    assert!(matches!(
        connector.get_connection(),
        Err(SqlConduitError::Connection(_))
    ));
    assert!(matches!(
        Pool::new(connector, PoolOptions::new(2)),
        Err(SqlConduitError::Connection(_))
    ));
}

#[test]
fn scoped_connection_runs_handler_and_passes_its_error_through() {
    let connector = Connector::new(SqliteDriver::new(), "sqlite::memory:");
    let err = connector
        .get_connection_and(|conn| conn.get_row("SELECT * FROM nowhere", &[]))
        .unwrap_err();
    assert!(matches!(err, SqlConduitError::DataAccess(_)));
}

#[test]
fn rows_map_into_records() {
    let dir = tempfile::tempdir().unwrap();
    let dao = library(&dir, 2);
    let books: Vec<Book> = dao
        .call(|conn| conn.get_result_as("SELECT * FROM books ORDER BY year", &[]))
        .unwrap();
    assert_eq!(books.len(), 3);
    assert_eq!(
        books[0],
        Book {
            id: 2,
            title: "Solaris".into(),
            year: 1961,
            in_print: false
        }
    );

    let titles = dao
        .call(|conn| {
            conn.get_result_with("SELECT title FROM books WHERE in_print = ?1", &[true.into()], |row| {
                required(row, "title", Row::get_string)
            })
        })
        .unwrap();
    assert_eq!(titles.len(), 2);

    let none = dao
        .call(|conn| conn.get_row_as::<Book>("SELECT * FROM books WHERE id = ?1", &[99.into()]))
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn row_access_is_zero_based_and_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    let dao = library(&dir, 1);
    let row = dao
        .call(|conn| conn.get_row("SELECT id, title AS Title, year FROM books WHERE id = 1", &[]))
        .unwrap()
        .unwrap();
    assert_eq!(row.column_names(), ["id", "Title", "year"]);
    assert_eq!(row.get_i64_at(0), Some(1));
    assert_eq!(row.get_string_at(1).as_deref(), Some("Dune"));
    assert_eq!(row.get_string("TITLE").as_deref(), Some("Dune"));
    assert_eq!(row.get_string("year").as_deref(), Some("1965"));
    assert!(row.get_by_index(3).is_none());
    assert!(row.is_null("missing"));
}

#[test]
fn dao_update_helpers() {
    let dir = tempfile::tempdir().unwrap();
    let dao = library(&dir, 1);

    let id = dao
        .id(|conn| {
            conn.get_update_result(
                "INSERT INTO books (title, year) VALUES (?1, ?2)",
                &["Ubik".into(), 1969.into()],
            )
        })
        .unwrap();
    assert_eq!(id, Some(4));

    let updated = dao
        .updated(|conn| {
            conn.get_update_result("UPDATE books SET in_print = 0 WHERE id = ?1", &[4.into()])
        })
        .unwrap();
    assert!(updated);

    let touched = dao
        .row_count(|conn| conn.get_update_result("UPDATE books SET year = year", &[]))
        .unwrap();
    assert_eq!(touched, 4);
    let no_id = dao
        .id(|conn| conn.get_update_result("DELETE FROM books WHERE id = 4", &[]))
        .unwrap();
    assert_eq!(no_id, None);
    assert!(
        dao.ids(|conn| conn.get_update_result("DELETE FROM books WHERE id = 99", &[]))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn dao_value_helpers() {
    let dir = tempfile::tempdir().unwrap();
    let dao = library(&dir, 1);
    let all = |conn: &PooledConnection| conn.get_result("SELECT id, title, year FROM books", &[]);

    let title = dao
        .value(
            |conn| conn.get_row("SELECT title FROM books WHERE id = 3", &[]),
            |row| required(row, "title", Row::get_string),
        )
        .unwrap();
    assert_eq!(title.as_deref(), Some("Hyperion"));

    let years = dao
        .value_sorted_set(all, |row| required(row, "year", Row::get_i64))
        .unwrap();
    assert_eq!(years, BTreeSet::from([1961, 1965, 1989]));

    let by_title: BTreeMap<String, i64> = dao
        .value_sorted_map(all, |row| {
            Ok((
                required(row, "title", Row::get_string)?,
                required(row, "id", Row::get_i64)?,
            ))
        })
        .unwrap();
    assert_eq!(by_title.keys().next().map(String::as_str), Some("Dune"));

    let ids = dao
        .value_list(all, |row| required(row, "id", Row::get_i64))
        .unwrap();
    assert_eq!(ids.len(), 3);
    let set = dao
        .value_set(all, |row| required(row, "in_print", Row::get_bool))
        .err();
    assert!(matches!(set, Some(SqlConduitError::Mapping(_))));
    let map = dao
        .value_map(all, |row| Ok((required(row, "id", Row::get_i64)?, row.get_string("title"))))
        .unwrap();
    assert_eq!(map.get(&2).cloned().flatten().as_deref(), Some("Solaris"));
}

#[test]
fn dao_transaction_commits_or_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let dao = library(&dir, 1);

    let result: Result<(), SqlConduitError> = dao.transaction(IsolationLevel::Serializable, |tx| {
        tx.get_update_result("DELETE FROM books", &[])?;
        Err(SqlConduitError::InvalidState("changed my mind".into()))
    });
    assert!(result.is_err());
    dao.transaction(IsolationLevel::Serializable, |tx| {
        tx.get_update_result("DELETE FROM books WHERE id = 1", &[])?;
        tx.complete()
    })
    .unwrap();

    let remaining = dao
        .call(|conn| conn.get_row_as::<i64>("SELECT count(*) FROM books", &[]))
        .unwrap();
    assert_eq!(remaining, Some(2));
}

#[test]
fn dao_maps_acquire_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let dao = library(&dir, 1).with_acquire_timeout(Duration::from_millis(20));
    let _held = dao.pool().get_available_connection().unwrap();

    let err = dao.call(|conn| conn.get_row("SELECT 1", &[])).unwrap_err();
    assert!(matches!(err, SqlConduitError::Timeout(_)));
    assert!(err.is_timeout());
}

#[test]
fn read_only_open_mode_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let dao = library(&dir, 1);
    drop(dao);

    let connector = ConnectorOptions::builder(
        dir.path().join("library.db").to_string_lossy().into_owned(),
    )
    .property("open_mode", "read_only")
    .build()
    .unwrap();
    let conn = connector.get_connection().unwrap();
    assert!(conn.get_row("SELECT count(*) FROM books", &[]).unwrap().is_some());
    let err = conn
        .get_update_result("DELETE FROM books", &[])
        .unwrap_err();
    assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::ReadOnly));
}

#[test]
fn config_file_builds_a_pool() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conduit.json");
    let db = dir.path().join("from-config.db");
    std::fs::write(
        &path,
        serde_json::json!({
            "connector": { "url": format!("sqlite:{}", db.display()), "wal": true, "batch_size": 2 },
            "pool": { "size": 3, "acquire_timeout_ms": 100 }
        })
        .to_string(),
    )
    .unwrap();

    let pool = ConduitConfig::from_file(&path).unwrap().build_pool().unwrap();
    assert_eq!(pool.get_total_connection_count(), 3);
    assert_eq!(pool.acquire_timeout(), Some(Duration::from_millis(100)));
    let conn = pool.get_available_connection().unwrap();
    assert_eq!(conn.batch_size(), 2);
    let mode = conn
        .get_row_as::<String>("PRAGMA journal_mode", &[])
        .unwrap();
    assert_eq!(mode.as_deref(), Some("wal"));
}
