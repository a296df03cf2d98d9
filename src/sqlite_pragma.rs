//! Shared PRAGMA tuning applied to every sqlite connection.

use rusqlite::Connection;

/// WAL journal, relaxed sync, memory temp store and a larger page cache.
/// Note: PRAGMA journal_mode returns a result row; `pragma_update` handles
/// that, plain `execute` does not.
pub fn apply_optimized_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "mmap_size", 134_217_728i64)?;
    conn.pragma_update(None, "cache_size", -64_000i64)?;
    conn.pragma_update(None, "wal_autocheckpoint", 1_000i64)?;
    Ok(())
}
