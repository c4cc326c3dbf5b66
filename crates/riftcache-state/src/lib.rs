//! # riftcache-state
//!
//! The (inode, mtime, size) -> hash index (§4.3): a SQLite-backed
//! cache that lets [`crate::hash`-layer callers][crate] skip
//! rehashing a file whose identity hasn't moved since the last time
//! it was hashed. Schema-versioned, corruption-tolerant, and evicted
//! by a timestamp-ordered LRU sweep once it grows past a configured
//! row limit.

mod error;
mod inode;

pub use error::{StateError, Result};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use std::sync::Mutex;

use riftcache_config::{log_state_debug, log_state_info, log_state_warn};
use riftcache_core::HashInfo;
use riftcache_fs::FileSystem;
use rusqlite::{params, Connection, OptionalExtension};

/// Current on-disk schema generation. Bumping this causes
/// [`StateCache::open`] to drop and recreate every table rather than
/// try to migrate a layout it no longer understands (§4.3, mirroring
/// `dvc.state`'s `PRAGMA user_version` check).
const SCHEMA_VERSION: i64 = 1;

/// A file's identity as far as the state cache is concerned: which
/// inode it lives at, and the (mtime, size) pair recorded against
/// that inode the last time it was hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    pub inode: u64,
    pub mtime_ns: i128,
    pub size: u64,
}

/// Single-file/directory-self identity via one `stat` call. For a
/// directory, pair this with [`mtime_and_size`] to get the identity
/// that covers its contents too.
pub fn stat_identity(fs: &dyn FileSystem, path: &Path) -> Result<FileIdentity> {
    let stat = fs.stat(path)?;
    Ok(FileIdentity {
        inode: stat.inode,
        mtime_ns: stat.mtime_ns,
        size: stat.size,
    })
}

/// The (mtime, size) pair covering a directory and every entry in
/// `dir_files` (already filtered by the caller, e.g. through an
/// ignore filter): mtime is the max across the directory and its
/// entries, size is the sum over the entries only (§4.3, matching
/// `dvc.state.State.mtime_and_size`'s asymmetric treatment of the two
/// fields).
pub fn mtime_and_size(
    fs: &dyn FileSystem,
    dir: &Path,
    dir_files: &[PathBuf],
) -> Result<(i128, u64)> {
    let dir_stat = fs.stat(dir)?;
    let mut mtime = dir_stat.mtime_ns;
    let mut size = 0u64;
    for file in dir_files {
        let stat = fs.stat(file)?;
        mtime = mtime.max(stat.mtime_ns);
        size = size.saturating_add(stat.size);
    }
    Ok((mtime, size))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// §4.3/§5: C3 is shared across the rayon worker pool during
/// directory hashing, so its connection is serialized behind a mutex
/// rather than handed out per-thread — `rusqlite::Connection` is
/// `Send` but not `Sync`, and SQLite itself expects one writer at a
/// time regardless.
pub struct StateCache {
    conn: Mutex<Connection>,
    path: PathBuf,
    row_limit: u64,
    row_cleanup_quota: u8,
}

impl StateCache {
    /// Open (creating if absent) the database at `path`. On a
    /// `DatabaseError` from SQLite itself (the file exists but isn't
    /// a valid database), the file is removed and recreated exactly
    /// once before giving up (§4.3).
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_limits(path, 100_000_000, 50)
    }

    pub fn open_with_limits(path: &Path, row_limit: u64, row_cleanup_quota: u8) -> Result<Self> {
        match Self::open_inner(path, row_limit, row_cleanup_quota) {
            Ok(cache) => Ok(cache),
            Err(StateError::Sqlite { .. }) => {
                log_state_warn!("state database looked corrupt, recreating", path = %path.display());
                let _ = std::fs::remove_file(path);
                Self::open_inner(path, row_limit, row_cleanup_quota)
                    .map_err(|_| StateError::Corrupt(path.to_path_buf()))
            }
            Err(other) => Err(other),
        }
    }

    fn open_inner(path: &Path, row_limit: u64, row_cleanup_quota: u8) -> Result<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path).map_err(|source| StateError::Sqlite {
            path: path.to_path_buf(),
            source,
        })?;
        let cache = Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            row_limit,
            row_cleanup_quota,
        };
        cache.prepare_db()?;
        Ok(cache)
    }

    fn sql(&self, source: rusqlite::Error) -> StateError {
        StateError::Sqlite {
            path: self.path.clone(),
            source,
        }
    }

    fn prepare_db(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let user_version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| self.sql(e))?;

        if user_version != 0 && user_version != SCHEMA_VERSION {
            log_state_info!(
                "state schema version changed, dropping old tables",
                from = user_version,
                to = SCHEMA_VERSION
            );
            conn.execute_batch(
                "DROP TABLE IF EXISTS state;
                     DROP TABLE IF EXISTS link_state;
                     DROP TABLE IF EXISTS state_info;",
            )
            .map_err(|e| self.sql(e))?;
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS state (
                    inode INTEGER PRIMARY KEY,
                    mtime TEXT NOT NULL,
                    size TEXT NOT NULL,
                    algorithm TEXT NOT NULL,
                    digest TEXT NOT NULL,
                    entry_count INTEGER,
                    timestamp INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS link_state (
                    path TEXT PRIMARY KEY,
                    inode INTEGER NOT NULL,
                    mtime TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS state_info (
                    count INTEGER
                );",
        )
        .map_err(|e| self.sql(e))?;

        conn.execute(
            "INSERT INTO state_info(count) SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM state_info)",
            [],
        )
        .map_err(|e| self.sql(e))?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| self.sql(e))?;

        Ok(())
    }

    /// Look up the hash recorded for `identity`, if its (mtime, size)
    /// still match what's on row (§4.3).
    pub fn get(&self, identity: &FileIdentity) -> Result<Option<HashInfo>> {
        let inode = inode::to_sqlite(identity.inode);
        let mtime = identity.mtime_ns.to_string();
        let size = identity.size.to_string();

        let row: Option<(String, String, String, String, Option<i64>)> = self
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT mtime, size, algorithm, digest, entry_count FROM state WHERE inode = ?1",
                params![inode],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| self.sql(e))?;

        let Some((row_mtime, row_size, algorithm, digest, entry_count)) = row else {
            return Ok(None);
        };
        if row_mtime != mtime || row_size != size {
            log_state_debug!("state entry stale", inode = identity.inode);
            return Ok(None);
        }

        self.bump_timestamp(inode)?;

        let mut info = HashInfo::new(algorithm, digest)?;
        info = info.with_size(identity.size);
        if let Some(count) = entry_count {
            info = info.with_entry_count(count as u64);
        }
        Ok(Some(info))
    }

    fn bump_timestamp(&self, inode: i64) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE state SET timestamp = ?1 WHERE inode = ?2",
                params![now_millis(), inode],
            )
            .map_err(|e| self.sql(e))?;
        Ok(())
    }

    /// Record `hash` against `identity`, inserting a fresh row or
    /// updating the existing one for that inode (§4.3).
    pub fn save(&self, identity: &FileIdentity, hash: &HashInfo) -> Result<()> {
        let inode = inode::to_sqlite(identity.inode);
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO state (inode, mtime, size, algorithm, digest, entry_count, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(inode) DO UPDATE SET
                    mtime = excluded.mtime,
                    size = excluded.size,
                    algorithm = excluded.algorithm,
                    digest = excluded.digest,
                    entry_count = excluded.entry_count,
                    timestamp = excluded.timestamp",
                params![
                    inode,
                    identity.mtime_ns.to_string(),
                    identity.size.to_string(),
                    hash.algorithm,
                    hash.digest,
                    hash.entry_count.map(|c| c as i64),
                    now_millis(),
                ],
            )
            .map_err(|e| self.sql(e))?;

        self.evict_if_needed()
    }

    fn evict_if_needed(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM state", [], |row| row.get(0))
            .map_err(|e| self.sql(e))?;
        let count = count.max(0) as u64;
        if count <= self.row_limit {
            return Ok(());
        }

        let overage = count - self.row_limit;
        let quota = (self.row_limit * self.row_cleanup_quota as u64) / 100;
        let delete = overage + quota;

        log_state_info!("evicting stale state rows", count = count, delete = delete);

        conn.execute(
            "DELETE FROM state WHERE inode IN (
                    SELECT inode FROM state ORDER BY timestamp ASC LIMIT ?1
                )",
            params![delete as i64],
        )
        .map_err(|e| self.sql(e))?;

        conn.execute("VACUUM", []).map_err(|e| self.sql(e))?;
        Ok(())
    }

    /// Remember that `path` currently points at `identity` through a
    /// materialized link, for later reconciliation by
    /// [`Self::remove_unused_links`] (§4.3, mirroring `update_link`).
    pub fn update_link(&self, path: &Path, identity: &FileIdentity) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO link_state (path, inode, mtime) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path) DO UPDATE SET inode = excluded.inode, mtime = excluded.mtime",
                params![
                    path.to_string_lossy(),
                    inode::to_sqlite(identity.inode),
                    identity.mtime_ns.to_string(),
                ],
            )
            .map_err(|e| self.sql(e))?;
        Ok(())
    }

    /// Drop bookkeeping for any tracked link whose path is no longer
    /// in `used`. If the on-disk file still has the identity recorded
    /// at link time, it is also removed (it's an orphaned cache link,
    /// not something the user created); otherwise only the row is
    /// dropped, since the path has since been repurposed (§4.3,
    /// mirroring `remove_unused_links`).
    pub fn remove_unused_links(&self, used: &HashSet<PathBuf>, fs: &dyn FileSystem) -> Result<()> {
        let rows: Vec<(String, i64, String)> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn
                .prepare("SELECT path, inode, mtime FROM link_state")
                .map_err(|e| self.sql(e))?;
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
                .map_err(|e| self.sql(e))?
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| self.sql(e))?
        };

        for (path_str, inode, mtime) in rows {
            let path = PathBuf::from(&path_str);
            if used.contains(&path) {
                continue;
            }

            if fs.exists(&path) {
                if let Ok(stat) = fs.stat(&path) {
                    if inode::to_sqlite(stat.inode) == inode && stat.mtime_ns.to_string() == mtime {
                        let _ = fs.remove(&path);
                    }
                }
            }

            self.conn
                .lock()
                .unwrap()
                .execute("DELETE FROM link_state WHERE path = ?1", params![path_str])
                .map_err(|e| self.sql(e))?;
        }
        Ok(())
    }
}
