// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Error type for this crate. Each variant corresponds to one of spec.md
/// §7's non-fatal, per-record/per-action error kinds; none of these abort a
/// run on their own, which is why callers generally collect them into a
/// `Vec` rather than propagate with `?`.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("I/O error on {0}: {1}")]
    Io(String, std::io::Error),

    #[error("archive error on {0}: {1}")]
    Archive(String, romkeep_archive::ArchiveError),

    #[error("digest computation failed for {0}: {1}")]
    DigestFailed(String, romkeep_digest::DigestError),

    #[error("write action failed for {0}: {1}")]
    WriteFailed(String, std::io::Error),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, MatcherError>;
