// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Native ZIP reading, via the `zip` crate. */

use {
    crate::{
        entry::ArchiveEntry,
        error::{ArchiveError, Result},
    },
    std::{
        fs::File,
        io::{Read, Write},
        path::{Path, PathBuf},
    },
};

pub struct ZipReader {
    path: PathBuf,
}

impl ZipReader {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open_archive(&self) -> Result<zip::ZipArchive<File>> {
        let file = File::open(&self.path).map_err(|e| ArchiveError::Io(self.path.display().to_string(), e))?;
        zip::ZipArchive::new(file).map_err(|e| ArchiveError::Zip(self.path.display().to_string(), e))
    }

    pub fn list(&self) -> Result<Vec<ArchiveEntry>> {
        let mut archive = self.open_archive()?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| ArchiveError::Zip(self.path.display().to_string(), e))?;
            entries.push(ArchiveEntry {
                name: file.name().to_string(),
                size: file.size(),
                crc32: Some(file.crc32()),
                is_dir: file.is_dir(),
            });
        }
        Ok(entries)
    }

    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = self.open_archive()?;
        let mut file = archive
            .by_name(name)
            .map_err(|_| ArchiveError::EntryNotFound(name.to_string()))?;
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| ArchiveError::Io(self.path.display().to_string(), e))?;
        Ok(buf)
    }

    /// Extract every member to `dest`, preserving the archive's internal
    /// directory structure. Returns the destination paths written.
    pub fn extract_all(&self, dest: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dest = dest.as_ref();
        let mut archive = self.open_archive()?;
        let mut written = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| ArchiveError::Zip(self.path.display().to_string(), e))?;

            let dest_path = dest.join(file.name());
            if file.is_dir() {
                std::fs::create_dir_all(&dest_path)
                    .map_err(|e| ArchiveError::Io(dest_path.display().to_string(), e))?;
                continue;
            }

            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ArchiveError::Io(parent.display().to_string(), e))?;
            }

            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)
                .map_err(|e| ArchiveError::Io(self.path.display().to_string(), e))?;
            let mut fh =
                File::create(&dest_path).map_err(|e| ArchiveError::Io(dest_path.display().to_string(), e))?;
            fh.write_all(&buf)
                .map_err(|e| ArchiveError::Io(dest_path.display().to_string(), e))?;
            written.push(dest_path);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_sample_zip(path: &Path) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("hello.txt", options).unwrap();
        writer.write_all(b"hello world").unwrap();
        writer.add_directory("sub/", options).unwrap();
        writer.start_file("sub/nested.txt", options).unwrap();
        writer.write_all(b"nested").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn lists_and_reads_entries() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("sample.zip");
        write_sample_zip(&zip_path);

        let reader = ZipReader::open(&zip_path);
        let entries = reader.list().unwrap();
        assert!(entries.iter().any(|e| e.name == "hello.txt" && e.size == 11));

        let body = reader.read_entry("hello.txt").unwrap();
        assert_eq!(body, b"hello world");
    }

    #[test]
    fn extract_all_preserves_structure() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("sample.zip");
        write_sample_zip(&zip_path);

        let extract_dir = dir.path().join("out");
        std::fs::create_dir_all(&extract_dir).unwrap();
        let reader = ZipReader::open(&zip_path);
        reader.extract_all(&extract_dir).unwrap();

        assert_eq!(std::fs::read(extract_dir.join("hello.txt")).unwrap(), b"hello world");
        assert_eq!(std::fs::read(extract_dir.join("sub/nested.txt")).unwrap(), b"nested");
    }

    #[test]
    fn read_entry_missing_name_errors() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("sample.zip");
        write_sample_zip(&zip_path);

        let reader = ZipReader::open(&zip_path);
        assert!(matches!(
            reader.read_entry("does-not-exist.txt"),
            Err(ArchiveError::EntryNotFound(_))
        ));
    }
}
