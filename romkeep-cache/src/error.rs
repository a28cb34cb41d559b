// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Error type for this crate. Corresponds to spec.md §7's `CacheOpenError`
/// kind for open/migration failures; lookup and store failures during a run
/// are non-fatal and are logged by the caller instead of propagated, per the
/// "degrade to no-cache" rule.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to open cache database at {0}: {1}")]
    Open(String, rusqlite::Error),

    #[error("cache database at {0} has schema version {1}, which this build does not understand")]
    UnsupportedSchemaVersion(String, i64),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to lock cache database at {0}: {1}")]
    Lock(String, std::io::Error),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, CacheError>;
