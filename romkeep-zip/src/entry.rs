// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The input to the TorrentZip writer: one archive member's name and raw
(uncompressed) bytes. */

/// One member to be written into a TorrentZip archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentZipEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl TorrentZipEntry {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}
