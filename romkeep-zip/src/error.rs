// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Error type for this crate. Corresponds to spec.md §7's `WriteError` kind.
#[derive(Debug, Error)]
pub enum TorrentZipError {
    #[error("I/O error writing archive at {0}: {1}")]
    Io(String, std::io::Error),

    #[error("duplicate entry name in archive: {0:?}")]
    DuplicateName(String),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, TorrentZipError>;
