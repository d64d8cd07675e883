use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Snapshot DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE briefs (
                conversation TEXT PRIMARY KEY,
                data         TEXT NOT NULL
            );

            CREATE TABLE stash (
                conversation TEXT PRIMARY KEY,
                data         TEXT NOT NULL
            );

            CREATE TABLE timelines (
                conversation TEXT PRIMARY KEY,
                pairs        TEXT NOT NULL,
                entry_count  INTEGER NOT NULL,
                updated_at   TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?)
}
