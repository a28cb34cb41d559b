// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The Catalog Index: an in-memory, read-only-after-construction lookup
table built from one or more parsed catalog documents.

Per the "cyclic/shared ownership" design note, entries live in a flat arena
(`Vec<CatalogEntry>`) and every lookup map holds `(entry_index, rom_index)`
pairs rather than references into the entries. This sidesteps self-
referential structures entirely and makes the whole index trivially
`Send + Sync` once built.
*/

use {
    crate::{
        error::{CatalogError, Result},
        normalize::{normalize_name, NameTokens},
        schema::{CatalogFormat, DatFile, Game, Rom},
    },
    std::collections::HashMap,
    std::path::Path,
};

/// A single (game, catalog) pair living in the index arena.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Name of the catalog (DAT) this entry came from, e.g. the DAT
    /// header's `name` field or the source file's stem.
    pub catalog_name: String,
    pub game: Game,
    pub tokens: NameTokens,
}

/// A reference to one ROM member of one entry in the arena.
pub type RomRef = (usize, usize);

fn digest_bytes(hex_str: &str, expect_len: usize, rom_name: &str) -> Result<Vec<u8>> {
    let bytes =
        hex::decode(hex_str).map_err(|e| CatalogError::BadDigestHex(rom_name.to_string(), hex_str.to_string(), e))?;
    if bytes.len() != expect_len {
        return Err(CatalogError::BadDigestLength(rom_name.to_string(), expect_len));
    }
    Ok(bytes)
}

#[derive(Debug, Default)]
pub struct CatalogIndex {
    entries: Vec<CatalogEntry>,
    by_sha256: HashMap<Vec<u8>, Vec<RomRef>>,
    by_sha1: HashMap<Vec<u8>, Vec<RomRef>>,
    by_md5: HashMap<Vec<u8>, Vec<RomRef>>,
    by_crc32_size: HashMap<(u32, u64), Vec<RomRef>>,
    by_name_size: HashMap<(String, u64), Vec<RomRef>>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, index: usize) -> &CatalogEntry {
        &self.entries[index]
    }

    pub fn rom(&self, romref: RomRef) -> &Rom {
        &self.entries[romref.0].game.roms[romref.1]
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Merge a parsed catalog document into the index under `catalog_name`.
    ///
    /// Per-ROM digest parse failures are collected and returned alongside a
    /// successful merge (the row is simply dropped from the digest maps but
    /// still participates in (name, size) matching) so one malformed ROM
    /// entry doesn't sink an entire catalog.
    pub fn ingest(&mut self, catalog_name: impl Into<String>, dat: DatFile) -> Vec<CatalogError> {
        let catalog_name = catalog_name.into();
        let mut warnings = Vec::new();

        for game in dat.games {
            let tokens = NameTokens::extract(&game.name);
            let entry_index = self.entries.len();

            for (rom_index, rom) in game.roms.iter().enumerate() {
                let romref = (entry_index, rom_index);

                if let Some(crc) = &rom.crc {
                    match u32::from_str_radix(crc, 16) {
                        Ok(value) => self
                            .by_crc32_size
                            .entry((value, rom.size))
                            .or_default()
                            .push(romref),
                        Err(_) => warnings.push(CatalogError::BadDigestHex(
                            rom.name.clone(),
                            crc.clone(),
                            hex::FromHexError::InvalidStringLength,
                        )),
                    }
                }

                if let Some(md5) = &rom.md5 {
                    match digest_bytes(md5, 16, &rom.name) {
                        Ok(bytes) => self.by_md5.entry(bytes).or_default().push(romref),
                        Err(e) => warnings.push(e),
                    }
                }

                if let Some(sha1) = &rom.sha1 {
                    match digest_bytes(sha1, 20, &rom.name) {
                        Ok(bytes) => self.by_sha1.entry(bytes).or_default().push(romref),
                        Err(e) => warnings.push(e),
                    }
                }

                if let Some(sha256) = &rom.sha256 {
                    match digest_bytes(sha256, 32, &rom.name) {
                        Ok(bytes) => self.by_sha256.entry(bytes).or_default().push(romref),
                        Err(e) => warnings.push(e),
                    }
                }

                let key = (normalize_name(&rom.name), rom.size);
                self.by_name_size.entry(key).or_default().push(romref);
            }

            self.entries.push(CatalogEntry {
                catalog_name: catalog_name.clone(),
                game,
                tokens,
            });
        }

        warnings
    }

    /// Parse and ingest a catalog file from disk, inferring its format from
    /// the file extension.
    pub fn ingest_path(&mut self, path: impl AsRef<Path>) -> Result<Vec<CatalogError>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| CatalogError::IoPath(path.display().to_string(), e))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = CatalogFormat::from_extension(ext)
            .ok_or_else(|| CatalogError::UnknownFormat(path.display().to_string()))?;
        let dat = DatFile::parse(&bytes, format)?;
        let catalog_name = if dat.header.name.is_empty() {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("catalog")
                .to_string()
        } else {
            dat.header.name.clone()
        };
        Ok(self.ingest(catalog_name, dat))
    }

    pub fn lookup_sha256(&self, digest: &[u8]) -> &[RomRef] {
        self.by_sha256.get(digest).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lookup_sha1(&self, digest: &[u8]) -> &[RomRef] {
        self.by_sha1.get(digest).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lookup_md5(&self, digest: &[u8]) -> &[RomRef] {
        self.by_md5.get(digest).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lookup_crc32_size(&self, crc32: u32, size: u64) -> &[RomRef] {
        self.by_crc32_size
            .get(&(crc32, size))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn lookup_name_size(&self, name: &str, size: u64) -> &[RomRef] {
        let key = (normalize_name(name), size);
        self.by_name_size.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dat() -> DatFile {
        let xml = r#"<?xml version="1.0"?>
<datafile>
  <header><name>Sample</name></header>
  <game name="Game A (USA)">
    <description>Game A (USA)</description>
    <rom name="Game A (USA).bin" size="10" crc="00000001" sha1="da39a3ee5e6b4b0d3255bfef95601890afd80709"/>
  </game>
</datafile>"#;
        DatFile::parse(xml.as_bytes(), CatalogFormat::Xml).unwrap()
    }

    #[test]
    fn ingest_populates_all_maps() {
        let mut index = CatalogIndex::new();
        let warnings = index.ingest("Sample", sample_dat());
        assert!(warnings.is_empty());
        assert_eq!(index.len(), 1);

        assert_eq!(index.lookup_crc32_size(1, 10).len(), 1);
        assert_eq!(
            index
                .lookup_sha1(&hex::decode("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap())
                .len(),
            1
        );
        assert_eq!(index.lookup_name_size("game a (usa)", 10).len(), 1);
    }

    #[test]
    fn bad_digest_hex_is_collected_not_fatal() {
        let mut dat = sample_dat();
        dat.games[0].roms[0].md5 = Some("not-hex".to_string());
        let mut index = CatalogIndex::new();
        let warnings = index.ingest("Sample", dat);
        assert_eq!(warnings.len(), 1);
        // ROM is still indexed by its valid digests.
        assert_eq!(index.lookup_crc32_size(1, 10).len(), 1);
    }
}
