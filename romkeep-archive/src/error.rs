// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Error type for this crate. Corresponds to spec.md §7's `ArchiveError`
/// kind.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unrecognized archive format for {0}")]
    UnknownFormat(String),

    #[error("zip error reading {0}: {1}")]
    Zip(String, zip::result::ZipError),

    #[error("I/O error on {0}: {1}")]
    Io(String, std::io::Error),

    #[error("external archiver {0:?} is not installed or not executable")]
    BackendUnavailable(String),

    #[error("external archiver {0:?} exited with status {1:?}: {2}")]
    BackendFailed(String, Option<i32>, String),

    #[error("could not parse external archiver listing output: {0}")]
    BackendOutputUnparseable(String),

    #[error("archive entry not found: {0}")]
    EntryNotFound(String),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, ArchiveError>;
