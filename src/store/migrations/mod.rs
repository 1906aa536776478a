//! Story schema history. The applied step is recorded in `PRAGMA user_version`.

use std::cmp::Ordering;

use rusqlite::Connection;

use super::{StoreError, StoreResult};

/// `(version, sql)` pairs in ascending order; a step is never edited once released.
const STEPS: &[(u32, &str)] = &[(1, include_str!("0001_success_story.sql"))];

/// Newest schema this build can write.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |&(version, _)| version)
}

pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Brings the database up to [`latest_version`]. All pending steps share one transaction.
pub fn apply_migrations(conn: &mut Connection) -> StoreResult<()> {
    let found = current_version(conn)?;
    let latest = latest_version();

    match found.cmp(&latest) {
        Ordering::Equal => return Ok(()),
        Ordering::Greater => {
            return Err(StoreError::UnsupportedSchemaVersion {
                db_version: found,
                latest_supported: latest,
            })
        }
        Ordering::Less => {}
    }

    let tx = conn.transaction()?;
    for &(version, sql) in STEPS.iter().skip_while(|&&(version, _)| version <= found) {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    tracing::info!("Story schema upgraded from v{} to v{}", found, latest);
    Ok(())
}
