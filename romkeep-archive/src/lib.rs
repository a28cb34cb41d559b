// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! A uniform read interface over the archive formats a ROM collection is
commonly distributed in: ZIP (read natively via the `zip` crate) and 7z
(read by shelling out to an external `7z`/`7za` binary).

Format detection ([`magic::ArchiveKind::detect`]) prefers magic bytes over
file extension, so a misnamed archive is still opened with the right
backend.
*/

pub mod entry;
pub mod error;
pub mod magic;
pub mod sevenzip_backend;
pub mod zip_backend;

pub use crate::{
    entry::ArchiveEntry,
    error::{ArchiveError, Result},
    magic::ArchiveKind,
};

use std::path::{Path, PathBuf};

/// An opened archive, backed by whichever format its magic bytes or
/// extension indicated.
pub enum Archive {
    Zip(zip_backend::ZipReader),
    SevenZip(sevenzip_backend::SevenZipReader),
}

impl Archive {
    /// Open `path`, detecting its format. Reads up to 8 leading bytes for
    /// magic-number sniffing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let leading = read_leading_bytes(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        match ArchiveKind::detect(&leading, extension) {
            Some(ArchiveKind::Zip) => Ok(Archive::Zip(zip_backend::ZipReader::open(path))),
            Some(ArchiveKind::SevenZip) => Ok(Archive::SevenZip(sevenzip_backend::SevenZipReader::open(path))),
            None => Err(ArchiveError::UnknownFormat(path.display().to_string())),
        }
    }

    pub fn list(&self) -> Result<Vec<ArchiveEntry>> {
        match self {
            Archive::Zip(r) => r.list(),
            Archive::SevenZip(r) => r.list(),
        }
    }

    /// Read a single member's bytes. Always supported for ZIP; for 7z this
    /// extracts the whole archive to a temporary directory first since the
    /// external tool has no single-member streaming mode used here.
    pub fn read_entry(&self, name: &str, scratch_dir: impl AsRef<Path>) -> Result<Vec<u8>> {
        match self {
            Archive::Zip(r) => r.read_entry(name),
            Archive::SevenZip(r) => {
                r.extract_all(&scratch_dir)?;
                let path = scratch_dir.as_ref().join(name);
                std::fs::read(&path).map_err(|e| ArchiveError::Io(path.display().to_string(), e))
            }
        }
    }

    pub fn extract_all(&self, dest: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        match self {
            Archive::Zip(r) => r.extract_all(dest),
            Archive::SevenZip(r) => {
                r.extract_all(&dest)?;
                let entries = r.list()?;
                Ok(entries
                    .into_iter()
                    .filter(|e| !e.is_dir)
                    .map(|e| dest.as_ref().join(e.name))
                    .collect())
            }
        }
    }
}

fn read_leading_bytes(path: &Path) -> Result<Vec<u8>> {
    use std::io::Read;
    let mut file = std::fs::File::open(path).map_err(|e| ArchiveError::Io(path.display().to_string(), e))?;
    let mut buf = vec![0u8; 8];
    let n = file
        .read(&mut buf)
        .map_err(|e| ArchiveError::Io(path.display().to_string(), e))?;
    buf.truncate(n);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn opens_zip_by_magic_despite_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("misnamed.bin");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
            writer.start_file("a.txt", options).unwrap();
            writer.write_all(b"hi").unwrap();
            writer.finish().unwrap();
        }

        let archive = Archive::open(&path).unwrap();
        assert!(matches!(archive, Archive::Zip(_)));
        let entries = archive.list().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn unrecognized_file_is_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.nes");
        std::fs::write(&path, b"not an archive").unwrap();
        assert!(matches!(Archive::open(&path), Err(ArchiveError::UnknownFormat(_))));
    }
}
