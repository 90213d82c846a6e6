use sql_conduit::prelude::*;

fn open() -> Connection {
    let conn = Connector::new(SqliteDriver::new(), ":memory:")
        .get_connection()
        .unwrap();
    conn.execute_batch(
        "CREATE TABLE scores (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player TEXT NOT NULL UNIQUE,
            points INTEGER NOT NULL
        );",
    )
    .unwrap();
    conn
}

fn tuples(m: usize) -> Vec<Vec<RowValues>> {
    (0..m)
        .map(|i| vec![format!("player-{i}").into(), RowValues::Int(i as i64)])
        .collect()
}

const INSERT: &str = "INSERT INTO scores (player, points) VALUES (?1, ?2)";

#[test]
fn per_row_counts_do_not_depend_on_sub_batch_size() {
    let m = 10;
    let mut runs = Vec::new();
    for k in [1, m, m / 2, 3] {
        let conn = open();
        let counts = conn.get_update_batch_with_size(INSERT, k, &tuples(m)).unwrap();
        assert_eq!(counts.len(), m);
        runs.push(counts);
    }
    assert!(runs.iter().all(|run| *run == vec![1; m]));
}

#[test]
fn varying_update_counts_stay_aligned_for_every_sub_batch_size() {
    let m = 10;
    // points are 0..m, so "points >= t" touches m - t rows
    let thresholds: Vec<i64> = vec![7, 0, 9, 3, 5, 1, 8, 2, 6, 4];
    let expected: Vec<u64> = thresholds.iter().map(|t| (m as i64 - t) as u64).collect();
    let updates: Vec<Vec<RowValues>> = thresholds
        .iter()
        .map(|t| vec![RowValues::Int(*t)])
        .collect();

    for k in [1, m, m / 2, 3] {
        let conn = open();
        conn.get_update_batch(INSERT, &tuples(m)).unwrap();
        let counts = conn
            .get_update_large_batch_with_size(
                "UPDATE scores SET player = player WHERE points >= ?1",
                k,
                &updates,
            )
            .unwrap();
        assert_eq!(counts, expected, "sub-batch size {k}");
    }
}

#[test]
fn update_counts_follow_input_order() {
    let conn = open();
    conn.get_update_batch(INSERT, &tuples(6)).unwrap();

    let updates: Vec<Vec<RowValues>> = vec![
        vec![RowValues::Int(100), RowValues::Int(3)],
        vec![RowValues::Int(100), RowValues::Int(-1)],
        vec![RowValues::Int(0), RowValues::Int(0)],
    ];
    let counts = conn
        .get_update_large_batch_with_size(
            "UPDATE scores SET points = points + ?1 WHERE points >= ?2",
            2,
            &updates,
        )
        .unwrap();
    assert_eq!(counts, vec![3, 6, 6]);
}

#[test]
fn default_batch_size_comes_from_connection() {
    let conn = open();
    assert_eq!(conn.batch_size(), DEFAULT_BATCH_SIZE);
    conn.set_batch_size(4).unwrap();
    assert_eq!(conn.batch_size(), 4);
    assert!(matches!(conn.set_batch_size(0), Err(SqlConduitError::Config(_))));

    let counts = conn.get_update_large_batch(INSERT, &tuples(9)).unwrap();
    assert_eq!(counts.len(), 9);
}

#[test]
fn failing_sub_batch_is_rolled_back_and_reports_progress() {
    let conn = open();
    let mut rows = tuples(7);
    // duplicate player inside the third sub-batch
    rows[5] = vec!["player-0".into(), RowValues::Int(50)];

    let err = conn.get_update_batch_with_size(INSERT, 2, &rows).unwrap_err();
    match &err {
        SqlConduitError::Batch { completed, .. } => assert_eq!(completed, &vec![1, 1, 1, 1]),
        other => panic!("expected Batch, got {other:?}"),
    }
    assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::ConstraintViolation));

    let stored = conn
        .get_row_as::<i64>("SELECT count(*) FROM scores", &[])
        .unwrap();
    assert_eq!(stored, Some(4));
}

#[test]
fn batch_inside_transaction_follows_the_transaction() {
    let conn = open();
    let mut tx = conn.start_transaction(IsolationLevel::ReadCommitted).unwrap();
    let counts = tx.get_update_batch_with_size(INSERT, 3, &tuples(8)).unwrap();
    assert_eq!(counts.iter().sum::<usize>(), 8);
    assert!(conn.get_update_batch(INSERT, &tuples(1)).is_err());
    tx.rollback().unwrap();

    let stored = conn
        .get_row_as::<i64>("SELECT count(*) FROM scores", &[])
        .unwrap();
    assert_eq!(stored, Some(0));
}

#[test]
fn zero_sub_batch_size_is_a_config_error() {
    let conn = open();
    assert!(matches!(
        conn.get_update_batch_with_size(INSERT, 0, &tuples(2)),
        Err(SqlConduitError::Config(_))
    ));
}

#[test]
fn empty_batch_is_a_no_op() {
    let conn = open();
    assert!(conn.get_update_batch(INSERT, &[]).unwrap().is_empty());
}

#[test]
fn batch_result_keeps_generated_keys_per_set() {
    let conn = open();
    let results = conn.get_update_batch_result(INSERT, &tuples(3)).unwrap();
    let ids: Vec<i64> = results.iter().map(SqlResult::id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(results.iter().all(|r| r.is_update() && r.row_count() == 1));
}
