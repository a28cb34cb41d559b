// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Archive format detection: magic bytes first, file extension as a
fallback when fewer than the needed leading bytes are available. */

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const SEVENZ_MAGIC: &[u8] = b"7z\xbc\xaf\x27\x1c";

/// Which backend handles a given archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    SevenZip,
}

impl ArchiveKind {
    pub fn from_magic(leading_bytes: &[u8]) -> Option<Self> {
        if leading_bytes.starts_with(ZIP_MAGIC) || leading_bytes.starts_with(ZIP_EMPTY_MAGIC) {
            Some(Self::Zip)
        } else if leading_bytes.starts_with(SEVENZ_MAGIC) {
            Some(Self::SevenZip)
        } else {
            None
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "zip" => Some(Self::Zip),
            "7z" => Some(Self::SevenZip),
            _ => None,
        }
    }

    /// Sniff by magic bytes, falling back to the extension if the byte
    /// slice is too short or doesn't match a known magic.
    pub fn detect(leading_bytes: &[u8], extension: Option<&str>) -> Option<Self> {
        Self::from_magic(leading_bytes).or_else(|| extension.and_then(Self::from_extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_zip_by_magic() {
        assert_eq!(ArchiveKind::from_magic(b"PK\x03\x04rest"), Some(ArchiveKind::Zip));
    }

    #[test]
    fn detects_empty_zip_magic() {
        assert_eq!(ArchiveKind::from_magic(b"PK\x05\x06rest"), Some(ArchiveKind::Zip));
    }

    #[test]
    fn detects_sevenzip_by_magic() {
        assert_eq!(
            ArchiveKind::from_magic(b"7z\xbc\xaf\x27\x1crest"),
            Some(ArchiveKind::SevenZip)
        );
    }

    #[test]
    fn falls_back_to_extension_when_magic_unknown() {
        assert_eq!(ArchiveKind::detect(b"", Some("zip")), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::detect(b"garbage", Some("7z")), Some(ArchiveKind::SevenZip));
        assert_eq!(ArchiveKind::detect(b"garbage", Some("nes")), None);
    }

    #[test]
    fn magic_takes_priority_over_misleading_extension() {
        assert_eq!(
            ArchiveKind::detect(b"PK\x03\x04rest", Some("7z")),
            Some(ArchiveKind::Zip)
        );
    }
}
