//! Schema versioning for the dismissal database.
//!
//! The applied version lives in `PRAGMA user_version`; each entry of
//! [`SCHEMA`] is one version, applied in order on open.

use libsql::Connection;
use tracing::{info, warn};

use crate::error::DatabaseError;

/// Schema steps; index `i` upgrades version `i` to `i + 1`. Append only.
const SCHEMA: &[&str] = &[
    // V1: dismissal records keyed by rule identifier.
    "CREATE TABLE IF NOT EXISTS dismissals (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );",
];

/// Bring the schema up to the latest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current = schema_version(conn).await?;
    let latest = SCHEMA.len() as i64;

    if current > latest {
        warn!(current, latest, "Dismissal database is newer than this build");
        return Ok(());
    }

    for (version, sql) in (1..).zip(SCHEMA).skip(current as usize) {
        conn.execute_batch(sql)
            .await
            .map_err(|e| DatabaseError::Migration(format!("schema V{version}: {e}")))?;
        // PRAGMA takes no bound parameters.
        conn.execute(&format!("PRAGMA user_version = {version}"), ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("recording V{version}: {e}")))?;
        info!(version, "Applied dismissal schema");
    }

    Ok(())
}

async fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("PRAGMA user_version", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading user_version: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading user_version: {e}")))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(format!("parsing user_version: {e}"))),
        None => Ok(0),
    }
}
