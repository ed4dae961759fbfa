use parley_db::{create_pool, run_migrations, DbRuntimeSettings};

#[test]
fn db_initialization_creates_call_history() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("parley.db");
    let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default())
        .expect("failed to create pool");
    let conn = pool.get().expect("failed to get connection");
    let applied = run_migrations(&conn).expect("failed to run migrations");
    assert_eq!(applied, 2);

    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .expect("failed to prepare table query");
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .expect("failed to execute table query")
        .map(|r| r.expect("failed to read table name"))
        .collect();

    assert_eq!(tables, vec!["_parley_migrations", "call_history"]);
}

#[test]
fn file_pool_uses_wal_and_shares_state_across_connections() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("parley.db");
    let pool = create_pool(
        path.to_str().unwrap(),
        DbRuntimeSettings {
            busy_timeout_ms: 1_000,
            pool_max_size: 2,
        },
    )
    .expect("failed to create pool");

    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        conn.execute(
            "INSERT INTO call_history (phone_number, role, message) VALUES ('+1555', 'user', 'hi')",
            [],
        )
        .unwrap();
    }

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    for conn in [&a, &b] {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM call_history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
