// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The Raw Record: the unit of work the Scanner emits and the Matcher
consumes. */

use romkeep_digest::{Digest, HeaderDescriptor};
use std::path::PathBuf;

/// A single scanned, hashed file (or archive member), immutable once built.
///
/// Per the data model invariant, a record identifies itself uniquely by the
/// SHA-256 of its hashable payload when that digest was computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Absolute path to the original source (the archive's path, if this
    /// record came from inside one; otherwise the plain file's path).
    pub source_path: PathBuf,
    /// Set when this record was read out of an archive.
    pub enclosing_archive: Option<PathBuf>,
    /// The entry name within `enclosing_archive`, when set.
    pub inner_entry: Option<String>,
    /// Size of the hashable payload, after any header skip.
    pub size: u64,
    pub digest: Digest,
    pub header: Option<HeaderDescriptor>,
    pub modified_unix: i64,
}

impl RawRecord {
    /// The display name used for matching by (normalized-name, size): the
    /// inner entry name if this came from an archive, else the file name.
    pub fn match_name(&self) -> String {
        if let Some(inner) = &self.inner_entry {
            inner.clone()
        } else {
            self.source_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        }
    }

    /// A stable identity string for diagnostics: prefers the SHA-256 hex
    /// digest, falling back to the display path if SHA-256 wasn't computed.
    pub fn identity(&self) -> String {
        self.digest
            .sha256_hex()
            .unwrap_or_else(|| self.display_path())
    }

    pub fn display_path(&self) -> String {
        match (&self.enclosing_archive, &self.inner_entry) {
            (Some(archive), Some(entry)) => format!("{}!{}", archive.display(), entry),
            _ => self.source_path.display().to_string(),
        }
    }
}
