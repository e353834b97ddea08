//! Queries against the trace store embedded in a pack.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::collections::BTreeSet;
use std::path::PathBuf;

use super::{Pack, TRACE_MEMBER};

/// `opened_files.mode` value recorded for a process working directory.
pub const FILE_WDIR: i64 = 0x04;

/// Every path the traced processes used as their working directory.
///
/// Returns `Ok(None)` when the pack has no trace store. The store is
/// unpacked into a temporary directory that is removed before returning.
pub fn list_working_directories(pack: &Pack) -> Result<Option<BTreeSet<PathBuf>>> {
    let tmp = tempfile::Builder::new()
        .prefix("packroot_")
        .tempdir()
        .context("Failed to create temporary directory")?;
    let database = tmp.path().join("trace.sqlite3");

    if !pack.extract_member(TRACE_MEMBER, &database)? {
        return Ok(None);
    }

    let conn = Connection::open_with_flags(
        &database,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .context("Failed to open trace store")?;

    let mut stmt = conn
        .prepare("SELECT DISTINCT name FROM opened_files WHERE mode = ?1")
        .context("Failed to query trace store")?;
    let rows = stmt.query_map([FILE_WDIR], |row| row.get::<_, String>(0))?;

    let mut dirs = BTreeSet::new();
    for name in rows {
        dirs.insert(PathBuf::from(name.context("Failed to read trace store row")?));
    }
    Ok(Some(dirs))
}
