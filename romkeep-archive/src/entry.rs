// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The archive-format-agnostic entry listing shared by both backends. */

/// One member of an archive, as reported by its directory listing. `crc32`
/// is `None` for backends (7z with certain compression methods) that don't
/// expose it without a full extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
    pub crc32: Option<u32>,
    pub is_dir: bool,
}
