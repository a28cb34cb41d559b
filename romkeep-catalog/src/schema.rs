// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The on-disk catalog ("DAT") document schema.

Two wire formats are recognized: the "logiqx" XML schema used by most
cataloging tools in this space, and a JSON document with the same shape for
catalogs already converted by other tooling. Both deserialize into the same
[`DatFile`] tree so the rest of the crate never needs to know which format a
particular catalog file was written in.
*/

use {
    crate::error::Result,
    serde::{Deserialize, Serialize},
    std::io::Read,
};

/// Which wire format a catalog document is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Xml,
    Json,
}

impl CatalogFormat {
    /// Guess the format from a file extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "dat" | "xml" => Some(Self::Xml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// A whole catalog document: a header plus the games it describes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "datafile")]
pub struct DatFile {
    #[serde(default)]
    pub header: DatHeader,
    #[serde(rename = "game", default)]
    pub games: Vec<Game>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatHeader {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
}

/// A single canonical release ("game") and its constituent ROM members.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Game {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "isbios", default)]
    pub is_bios: Option<String>,
    #[serde(rename = "isdevice", default)]
    pub is_device: Option<String>,
    #[serde(rename = "rom", default)]
    pub roms: Vec<Rom>,
}

impl Game {
    pub fn is_bios(&self) -> bool {
        matches!(self.is_bios.as_deref(), Some("yes"))
    }

    pub fn is_device(&self) -> bool {
        matches!(self.is_device.as_deref(), Some("yes"))
    }
}

/// A single ROM member of a [`Game`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rom {
    #[serde(default)]
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub crc: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Rom {
    /// Whether this ROM is flagged as a known-bad dump by the catalog.
    pub fn is_bad_dump(&self) -> bool {
        matches!(self.status.as_deref(), Some("baddump"))
    }
}

impl DatFile {
    /// Parse a catalog document of the given format.
    pub fn parse(bytes: &[u8], format: CatalogFormat) -> Result<Self> {
        match format {
            CatalogFormat::Xml => Ok(serde_xml_rs::from_reader(bytes)?),
            CatalogFormat::Json => Ok(serde_json::from_slice(bytes)?),
        }
    }

    /// Parse from an arbitrary reader (used when streaming a catalog file
    /// directly from disk rather than buffering it first).
    pub fn from_reader(reader: impl Read, format: CatalogFormat) -> Result<Self> {
        match format {
            CatalogFormat::Xml => Ok(serde_xml_rs::from_reader(reader)?),
            CatalogFormat::Json => Ok(serde_json::from_reader(reader)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0"?>
<datafile>
  <header>
    <name>Sample</name>
    <description>Sample DAT</description>
    <version>1.0</version>
  </header>
  <game name="Game A (USA)">
    <description>Game A (USA)</description>
    <rom name="Game A (USA).bin" size="131072" crc="abcd1234" sha1="da39a3ee5e6b4b0d3255bfef95601890afd80709"/>
  </game>
</datafile>"#;

    #[test]
    fn parses_xml_sample() {
        let dat = DatFile::parse(SAMPLE_XML.as_bytes(), CatalogFormat::Xml).unwrap();
        assert_eq!(dat.header.name, "Sample");
        assert_eq!(dat.games.len(), 1);
        assert_eq!(dat.games[0].roms[0].size, 131072);
        assert_eq!(dat.games[0].roms[0].crc.as_deref(), Some("abcd1234"));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(CatalogFormat::from_extension("dat"), Some(CatalogFormat::Xml));
        assert_eq!(CatalogFormat::from_extension("JSON"), Some(CatalogFormat::Json));
        assert_eq!(CatalogFormat::from_extension("zip"), None);
    }
}
