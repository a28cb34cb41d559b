// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! A persistent, content-addressed cache of previously computed file
digests and enrichment-lookup results, backed by SQLite.

The cache is keyed off a file's `(path, size, mtime)` stamp rather than its
own digest, since the digest is exactly the expensive thing being cached.
Enrichment results are keyed off the digest that was looked up, since those
never change for a given digest.

Any failure opening or migrating the database is surfaced as a
[`error::CacheError`]; callers are expected to fall back to running without a
cache (per the "cache open failure is never fatal to the run" rule) rather
than aborting.
*/

pub mod error;

pub use crate::error::{CacheError, Result};

use {
    fs2::FileExt,
    indoc::indoc,
    rusqlite::{params, Connection, OptionalExtension},
    std::path::{Path, PathBuf},
};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &[&str] = &[
    indoc! {"
        CREATE TABLE checksums (
            path TEXT NOT NULL,
            size INTEGER NOT NULL,
            mtime INTEGER NOT NULL,
            crc32 INTEGER,
            md5 TEXT,
            sha1 TEXT,
            sha256 TEXT,
            computed_at INTEGER NOT NULL,
            PRIMARY KEY (path, size, mtime)
        )
    "},
    indoc! {"
        CREATE TABLE enrichment (
            source TEXT NOT NULL,
            digest TEXT NOT NULL,
            payload TEXT NOT NULL,
            fetched_at INTEGER NOT NULL,
            PRIMARY KEY (source, digest)
        )
    "},
];

/// Identifies a file's on-disk state at the time a digest was computed. If
/// any field changes between runs, the cached digests are considered stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileStamp {
    pub path: String,
    pub size: u64,
    pub mtime_unix: i64,
}

/// A previously computed set of digests for a [`FileStamp`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedDigests {
    pub crc32: Option<u32>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

/// A previously fetched enrichment payload, opaque to this crate. Callers
/// (the `romkeep-enrichment` crate) serialize/deserialize the payload body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEnrichment {
    pub payload_json: String,
    pub fetched_at_unix: i64,
}

/// A handle on the persistent cache database.
pub struct Cache {
    conn: Connection,
    db_path: PathBuf,
}

impl Cache {
    /// Open (creating if absent) the cache database at `path`, applying
    /// schema migrations as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path)
            .map_err(|e| CacheError::Open(db_path.display().to_string(), e))?;

        let cache = Self { conn, db_path };
        cache.init()?;
        Ok(cache)
    }

    /// Open an in-memory cache, useful for tests and `--cache-only` dry runs
    /// where no persistence across process invocations is desired.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn,
            db_path: PathBuf::from(":memory:"),
        };
        cache.init()?;
        Ok(cache)
    }

    fn init(&self) -> Result<()> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;

        let user_version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        match user_version {
            0 => {
                for statement in SCHEMA {
                    self.conn.execute(statement, [])?;
                }
                self.conn
                    .execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
            }
            v if v == SCHEMA_VERSION => {}
            other => {
                return Err(CacheError::UnsupportedSchemaVersion(
                    self.db_path.display().to_string(),
                    other,
                ));
            }
        }

        Ok(())
    }

    /// Take an exclusive filesystem lock guarding this cache's database file
    /// for the duration of a write-heavy batch, via a `.lock` sidecar.
    ///
    /// SQLite's own locking already serializes individual statements; this
    /// is for callers that want to batch many writes under one held lock to
    /// avoid lock-contention thrashing across threads.
    pub fn lock_for_writes(&self) -> Result<CacheWriteGuard> {
        let lock_path = self.db_path.with_extension("lock");
        let file = std::fs::File::create(&lock_path)
            .map_err(|e| CacheError::Lock(lock_path.display().to_string(), e))?;
        file.lock_exclusive()
            .map_err(|e| CacheError::Lock(lock_path.display().to_string(), e))?;
        Ok(CacheWriteGuard { _file: file })
    }

    pub fn get_checksums(&self, stamp: &FileStamp, now_unix: i64) -> Result<Option<CachedDigests>> {
        let _ = now_unix;
        self.conn
            .query_row(
                "SELECT crc32, md5, sha1, sha256 FROM checksums WHERE path = ?1 AND size = ?2 AND mtime = ?3",
                params![stamp.path, stamp.size as i64, stamp.mtime_unix],
                |row| {
                    Ok(CachedDigests {
                        crc32: row.get::<_, Option<i64>>(0)?.map(|v| v as u32),
                        md5: row.get(1)?,
                        sha1: row.get(2)?,
                        sha256: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(CacheError::from)
    }

    pub fn put_checksums(
        &self,
        stamp: &FileStamp,
        digests: &CachedDigests,
        computed_at_unix: i64,
    ) -> Result<()> {
        self.conn.execute(
            indoc! {"
                INSERT INTO checksums (path, size, mtime, crc32, md5, sha1, sha256, computed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(path, size, mtime) DO UPDATE SET
                    crc32 = excluded.crc32,
                    md5 = excluded.md5,
                    sha1 = excluded.sha1,
                    sha256 = excluded.sha256,
                    computed_at = excluded.computed_at
            "},
            params![
                stamp.path,
                stamp.size as i64,
                stamp.mtime_unix,
                digests.crc32.map(|v| v as i64),
                digests.md5,
                digests.sha1,
                digests.sha256,
                computed_at_unix,
            ],
        )?;
        Ok(())
    }

    pub fn get_enrichment(&self, source: &str, digest_hex: &str) -> Result<Option<CachedEnrichment>> {
        self.conn
            .query_row(
                "SELECT payload, fetched_at FROM enrichment WHERE source = ?1 AND digest = ?2",
                params![source, digest_hex],
                |row| {
                    Ok(CachedEnrichment {
                        payload_json: row.get(0)?,
                        fetched_at_unix: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(CacheError::from)
    }

    pub fn put_enrichment(
        &self,
        source: &str,
        digest_hex: &str,
        payload_json: &str,
        fetched_at_unix: i64,
    ) -> Result<()> {
        self.conn.execute(
            indoc! {"
                INSERT INTO enrichment (source, digest, payload, fetched_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(source, digest) DO UPDATE SET
                    payload = excluded.payload,
                    fetched_at = excluded.fetched_at
            "},
            params![source, digest_hex, payload_json, fetched_at_unix],
        )?;
        Ok(())
    }
}

/// Held for the duration of a write batch; releases the filesystem lock on
/// drop.
pub struct CacheWriteGuard {
    _file: std::fs::File,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stamp() -> FileStamp {
        FileStamp {
            path: "/roms/game.nes".to_string(),
            size: 131_088,
            mtime_unix: 1_700_000_000,
        }
    }

    #[test]
    fn round_trips_checksums() {
        let cache = Cache::open_in_memory().unwrap();
        let stamp = sample_stamp();
        assert!(cache.get_checksums(&stamp, 0).unwrap().is_none());

        let digests = CachedDigests {
            crc32: Some(0xdeadbeef),
            md5: Some("d41d8cd98f00b204e9800998ecf8427e".to_string()),
            sha1: None,
            sha256: None,
        };
        cache.put_checksums(&stamp, &digests, 1_700_000_100).unwrap();

        let fetched = cache.get_checksums(&stamp, 0).unwrap().unwrap();
        assert_eq!(fetched, digests);
    }

    #[test]
    fn stamp_change_misses_cache() {
        let cache = Cache::open_in_memory().unwrap();
        let stamp = sample_stamp();
        cache
            .put_checksums(&stamp, &CachedDigests::default(), 0)
            .unwrap();

        let mut moved = stamp.clone();
        moved.mtime_unix += 1;
        assert!(cache.get_checksums(&moved, 0).unwrap().is_none());
    }

    #[test]
    fn upsert_overwrites_existing_checksums() {
        let cache = Cache::open_in_memory().unwrap();
        let stamp = sample_stamp();
        cache
            .put_checksums(
                &stamp,
                &CachedDigests {
                    crc32: Some(1),
                    ..Default::default()
                },
                0,
            )
            .unwrap();
        cache
            .put_checksums(
                &stamp,
                &CachedDigests {
                    crc32: Some(2),
                    ..Default::default()
                },
                1,
            )
            .unwrap();

        let fetched = cache.get_checksums(&stamp, 0).unwrap().unwrap();
        assert_eq!(fetched.crc32, Some(2));
    }

    #[test]
    fn round_trips_enrichment() {
        let cache = Cache::open_in_memory().unwrap();
        assert!(cache.get_enrichment("source-h", "abcd").unwrap().is_none());

        cache
            .put_enrichment("source-h", "abcd", r#"{"title":"Game"}"#, 42)
            .unwrap();
        let fetched = cache.get_enrichment("source-h", "abcd").unwrap().unwrap();
        assert_eq!(fetched.payload_json, r#"{"title":"Game"}"#);
        assert_eq!(fetched.fetched_at_unix, 42);
    }

    #[test]
    fn reopening_persisted_database_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("cache.sqlite");
        let stamp = sample_stamp();

        {
            let cache = Cache::open(&db_path).unwrap();
            cache
                .put_checksums(
                    &stamp,
                    &CachedDigests {
                        sha256: Some("aa".repeat(32)),
                        ..Default::default()
                    },
                    0,
                )
                .unwrap();
        }

        let cache = Cache::open(&db_path).unwrap();
        let fetched = cache.get_checksums(&stamp, 0).unwrap().unwrap();
        assert_eq!(fetched.sha256, Some("aa".repeat(32)));
    }
}
