// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The header-descriptor table: a versioned, data-driven description of
known leading byte sequences that should be skipped before hashing.
*/

use {
    crate::error::Result,
    serde::Deserialize,
};

const BUILTIN_TABLE: &str = include_str!("../data/headers.toml");

/// A single row of the header-descriptor table, as loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderRow {
    pub name: String,
    pub extensions: Vec<String>,
    pub magic_hex: String,
    pub skip_len: u64,
}

#[derive(Debug, Deserialize)]
struct HeaderTableFile {
    #[serde(rename = "header")]
    rows: Vec<HeaderRow>,
}

/// A parsed, probeable header-descriptor table.
#[derive(Debug, Clone)]
pub struct HeaderTable {
    rows: Vec<(HeaderRow, Vec<u8>)>,
}

/// The result of a successful header probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderDescriptor {
    /// Offset at which the header begins (always 0 for this table).
    pub offset: u64,
    /// Number of bytes to skip before hashing.
    pub length: u64,
}

impl HeaderTable {
    /// Parse a header table from TOML source text.
    pub fn parse(source: &str) -> Result<Self> {
        let file: HeaderTableFile = toml::from_str(source)?;
        let mut rows = Vec::with_capacity(file.rows.len());
        for row in file.rows {
            let magic = hex::decode(&row.magic_hex)?;
            rows.push((row, magic));
        }
        Ok(Self { rows })
    }

    /// The header table shipped inside the `romkeep` binary.
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_TABLE).expect("builtin header table must parse")
    }

    /// Probe a file's leading bytes (and optionally its extension) for a
    /// known header. `extension` should be lowercase, without the leading
    /// dot.
    pub fn probe(&self, leading_bytes: &[u8], extension: Option<&str>) -> Option<HeaderDescriptor> {
        for (row, magic) in &self.rows {
            if let Some(ext) = extension {
                if !row.extensions.iter().any(|e| e == ext) {
                    continue;
                }
            }

            if leading_bytes.len() >= magic.len() && &leading_bytes[..magic.len()] == magic.as_slice()
            {
                return Some(HeaderDescriptor {
                    offset: 0,
                    length: row.skip_len,
                });
            }
        }

        None
    }

    /// Number of rows loaded, mostly useful for diagnostics/tests.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for HeaderTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_parses() {
        let table = HeaderTable::builtin();
        assert!(!table.is_empty());
    }

    #[test]
    fn probes_ines_header() {
        let table = HeaderTable::builtin();
        let mut data = vec![0x4e, 0x45, 0x53, 0x1a];
        data.extend(std::iter::repeat(0).take(12));
        let desc = table.probe(&data, Some("nes")).unwrap();
        assert_eq!(desc.length, 16);
        assert_eq!(desc.offset, 0);
    }

    #[test]
    fn no_match_returns_none() {
        let table = HeaderTable::builtin();
        assert!(table.probe(&[0, 0, 0, 0], Some("nes")).is_none());
    }

    #[test]
    fn extension_mismatch_is_ignored_when_no_hint_given() {
        let table = HeaderTable::builtin();
        let mut data = vec![0x4e, 0x45, 0x53, 0x1a];
        data.extend(std::iter::repeat(0).take(12));
        // No extension hint: magic bytes alone are sufficient.
        assert!(table.probe(&data, None).is_some());
    }
}
