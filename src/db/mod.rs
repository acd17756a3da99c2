pub mod migrations;
pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

/// Opens the credential database at `path` and brings its schema up to date.
/// `:memory:` gives a throwaway database.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open credential database at {path}"))?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
        .context("failed to configure credential database")?;

    migrations::run_migrations(&conn)?;
    tracing::info!(%path, "credential database ready");

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_in_memory() {
        let conn = init_db(":memory:").unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM google_accounts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
