// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! A deterministic zip archive writer, historically nicknamed "TorrentZip":
given the same set of (name, bytes) members, it always produces the same
archive bytes, regardless of the order members are supplied in. This makes
archives producible by this tool reproducible and diffable across machines
and runs.
*/

pub mod entry;
pub mod error;
pub mod writer;

pub use crate::{
    entry::TorrentZipEntry,
    error::{Result, TorrentZipError},
    writer::TorrentZipWriter,
};
