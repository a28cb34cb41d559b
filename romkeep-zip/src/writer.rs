// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The deterministic ("TorrentZip") archive writer.

Two archives built from the same set of (name, bytes) members always produce
byte-identical output: entries are sorted by lowercase name (ties broken by
the original name), timestamps are forced to a fixed epoch, compression is
always maximum-level DEFLATE, and the only variable metadata — the
End-Of-Central-Directory comment — carries the CRC32 of the central
directory itself rather than anything run-specific.
*/

use {
    crate::{
        entry::TorrentZipEntry,
        error::{Result, TorrentZipError},
    },
    byteorder::{LittleEndian, WriteBytesExt},
    flate2::{write::DeflateEncoder, Compression},
    std::{
        io::Write,
        path::{Path, PathBuf},
    },
};

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_FILE_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const ZIP64_EOCD_SIGNATURE: u32 = 0x0606_4b50;
const ZIP64_EOCD_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;
const EOCD_SIGNATURE: u32 = 0x0605_4b50;

const ZIP64_EXTRA_TAG: u16 = 0x0001;

/// DOS date for 1996-12-24, the historical TorrentZip epoch.
const EPOCH_DOS_DATE: u16 = ((1996 - 1980) << 9) | (12 << 5) | 24;
/// DOS time for 23:32:00.
const EPOCH_DOS_TIME: u16 = (23 << 11) | (32 << 5) | (0 / 2);

const ZIP64_SIZE_THRESHOLD: u64 = 0xFFFF_FFFF;
const ZIP64_ENTRY_COUNT_THRESHOLD: u64 = 0xFFFF;

fn needs_zip64_sizes(uncompressed_size: u64, compressed_size: u64) -> bool {
    uncompressed_size >= ZIP64_SIZE_THRESHOLD || compressed_size >= ZIP64_SIZE_THRESHOLD
}

struct WrittenEntry {
    name: Vec<u8>,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
}

fn deflate_max(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}

fn write_local_header(buf: &mut Vec<u8>, name: &[u8], crc32: u32, compressed_size: u64, uncompressed_size: u64) {
    let zip64 = needs_zip64_sizes(uncompressed_size, compressed_size);

    buf.write_u32::<LittleEndian>(LOCAL_FILE_HEADER_SIGNATURE).unwrap();
    buf.write_u16::<LittleEndian>(if zip64 { 45 } else { 20 }).unwrap();
    buf.write_u16::<LittleEndian>(0).unwrap(); // general purpose bit flag
    buf.write_u16::<LittleEndian>(8).unwrap(); // compression method: DEFLATE
    buf.write_u16::<LittleEndian>(EPOCH_DOS_TIME).unwrap();
    buf.write_u16::<LittleEndian>(EPOCH_DOS_DATE).unwrap();
    buf.write_u32::<LittleEndian>(crc32).unwrap();

    if zip64 {
        buf.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
        buf.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
    } else {
        buf.write_u32::<LittleEndian>(compressed_size as u32).unwrap();
        buf.write_u32::<LittleEndian>(uncompressed_size as u32).unwrap();
    }

    buf.write_u16::<LittleEndian>(name.len() as u16).unwrap();
    buf.write_u16::<LittleEndian>(if zip64 { 20 } else { 0 }).unwrap();
    buf.extend_from_slice(name);

    if zip64 {
        buf.write_u16::<LittleEndian>(ZIP64_EXTRA_TAG).unwrap();
        buf.write_u16::<LittleEndian>(16).unwrap();
        buf.write_u64::<LittleEndian>(uncompressed_size).unwrap();
        buf.write_u64::<LittleEndian>(compressed_size).unwrap();
    }
}

fn write_central_header(buf: &mut Vec<u8>, entry: &WrittenEntry) {
    let zip64 = needs_zip64_sizes(entry.uncompressed_size, entry.compressed_size)
        || entry.local_header_offset >= ZIP64_SIZE_THRESHOLD;

    buf.write_u32::<LittleEndian>(CENTRAL_FILE_HEADER_SIGNATURE).unwrap();
    buf.write_u16::<LittleEndian>(if zip64 { 45 } else { 20 }).unwrap(); // version made by
    buf.write_u16::<LittleEndian>(if zip64 { 45 } else { 20 }).unwrap(); // version needed
    buf.write_u16::<LittleEndian>(0).unwrap(); // general purpose bit flag
    buf.write_u16::<LittleEndian>(8).unwrap(); // compression method
    buf.write_u16::<LittleEndian>(EPOCH_DOS_TIME).unwrap();
    buf.write_u16::<LittleEndian>(EPOCH_DOS_DATE).unwrap();
    buf.write_u32::<LittleEndian>(entry.crc32).unwrap();

    if zip64 {
        buf.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
        buf.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
    } else {
        buf.write_u32::<LittleEndian>(entry.compressed_size as u32).unwrap();
        buf.write_u32::<LittleEndian>(entry.uncompressed_size as u32).unwrap();
    }

    buf.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
    buf.write_u16::<LittleEndian>(if zip64 { 28 } else { 0 }).unwrap(); // extra field length
    buf.write_u16::<LittleEndian>(0).unwrap(); // file comment length
    buf.write_u16::<LittleEndian>(0).unwrap(); // disk number start
    buf.write_u16::<LittleEndian>(0).unwrap(); // internal file attributes
    buf.write_u32::<LittleEndian>(0).unwrap(); // external file attributes

    if zip64 {
        buf.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
    } else {
        buf.write_u32::<LittleEndian>(entry.local_header_offset as u32).unwrap();
    }

    buf.extend_from_slice(&entry.name);

    if zip64 {
        buf.write_u16::<LittleEndian>(ZIP64_EXTRA_TAG).unwrap();
        buf.write_u16::<LittleEndian>(24).unwrap();
        buf.write_u64::<LittleEndian>(entry.uncompressed_size).unwrap();
        buf.write_u64::<LittleEndian>(entry.compressed_size).unwrap();
        buf.write_u64::<LittleEndian>(entry.local_header_offset).unwrap();
    }
}

/// Writes deterministic ("TorrentZip") archives.
pub struct TorrentZipWriter;

impl TorrentZipWriter {
    /// Build and write an archive at `path` containing `entries`.
    ///
    /// Writing happens to a sibling temp file first; on any failure the temp
    /// file is removed so a half-written archive never appears at `path`.
    pub fn write_to_path(path: impl AsRef<Path>, entries: Vec<TorrentZipEntry>) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = Self::temp_path_for(path);

        match Self::write_inner(&tmp_path, entries) {
            Ok(()) => {
                std::fs::rename(&tmp_path, path).map_err(|e| TorrentZipError::Io(path.display().to_string(), e))?;
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "archive".into());
        name.push(".torrentzip-tmp");
        path.with_file_name(name)
    }

    fn write_inner(tmp_path: &Path, mut entries: Vec<TorrentZipEntry>) -> Result<()> {
        entries.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });

        for pair in entries.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(TorrentZipError::DuplicateName(pair[0].name.clone()));
            }
        }

        let file =
            std::fs::File::create(tmp_path).map_err(|e| TorrentZipError::Io(tmp_path.display().to_string(), e))?;
        let mut out = std::io::BufWriter::new(file);

        let mut written = Vec::with_capacity(entries.len());
        let mut offset: u64 = 0;

        for entry in &entries {
            let crc32 = crc32fast::hash(&entry.data);
            let compressed = deflate_max(&entry.data).map_err(|e| TorrentZipError::Io(tmp_path.display().to_string(), e))?;

            let mut header = Vec::new();
            write_local_header(&mut header, entry.name.as_bytes(), crc32, compressed.len() as u64, entry.data.len() as u64);

            out.write_all(&header)
                .and_then(|_| out.write_all(&compressed))
                .map_err(|e| TorrentZipError::Io(tmp_path.display().to_string(), e))?;

            written.push(WrittenEntry {
                name: entry.name.as_bytes().to_vec(),
                crc32,
                compressed_size: compressed.len() as u64,
                uncompressed_size: entry.data.len() as u64,
                local_header_offset: offset,
            });

            offset += header.len() as u64 + compressed.len() as u64;
        }

        let cd_start_offset = offset;
        let mut central_directory = Vec::new();
        for entry in &written {
            write_central_header(&mut central_directory, entry);
        }
        out.write_all(&central_directory)
            .map_err(|e| TorrentZipError::Io(tmp_path.display().to_string(), e))?;

        let cd_size = central_directory.len() as u64;
        let entry_count = written.len() as u64;
        let needs_zip64_eocd = entry_count >= ZIP64_ENTRY_COUNT_THRESHOLD
            || cd_size >= ZIP64_SIZE_THRESHOLD
            || cd_start_offset >= ZIP64_SIZE_THRESHOLD;

        if needs_zip64_eocd {
            let zip64_eocd_offset = cd_start_offset + cd_size;
            let mut zip64_eocd = Vec::new();
            zip64_eocd.write_u32::<LittleEndian>(ZIP64_EOCD_SIGNATURE).unwrap();
            zip64_eocd.write_u64::<LittleEndian>(44).unwrap(); // size of this record, excluding the first 12 bytes
            zip64_eocd.write_u16::<LittleEndian>(45).unwrap(); // version made by
            zip64_eocd.write_u16::<LittleEndian>(45).unwrap(); // version needed
            zip64_eocd.write_u32::<LittleEndian>(0).unwrap(); // number of this disk
            zip64_eocd.write_u32::<LittleEndian>(0).unwrap(); // disk with start of CD
            zip64_eocd.write_u64::<LittleEndian>(entry_count).unwrap();
            zip64_eocd.write_u64::<LittleEndian>(entry_count).unwrap();
            zip64_eocd.write_u64::<LittleEndian>(cd_size).unwrap();
            zip64_eocd.write_u64::<LittleEndian>(cd_start_offset).unwrap();

            let mut locator = Vec::new();
            locator.write_u32::<LittleEndian>(ZIP64_EOCD_LOCATOR_SIGNATURE).unwrap();
            locator.write_u32::<LittleEndian>(0).unwrap(); // disk with zip64 eocd
            locator.write_u64::<LittleEndian>(zip64_eocd_offset).unwrap();
            locator.write_u32::<LittleEndian>(1).unwrap(); // total number of disks

            out.write_all(&zip64_eocd)
                .and_then(|_| out.write_all(&locator))
                .map_err(|e| TorrentZipError::Io(tmp_path.display().to_string(), e))?;
        }

        let cd_crc32 = crc32fast::hash(&central_directory);
        let comment = format!("TORRENTZIPPED-{:08X}", cd_crc32);

        let mut eocd = Vec::new();
        eocd.write_u32::<LittleEndian>(EOCD_SIGNATURE).unwrap();
        eocd.write_u16::<LittleEndian>(0).unwrap(); // number of this disk
        eocd.write_u16::<LittleEndian>(0).unwrap(); // disk where CD starts
        if needs_zip64_eocd {
            eocd.write_u16::<LittleEndian>(0xFFFF).unwrap();
            eocd.write_u16::<LittleEndian>(0xFFFF).unwrap();
            eocd.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
            eocd.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
        } else {
            eocd.write_u16::<LittleEndian>(entry_count as u16).unwrap();
            eocd.write_u16::<LittleEndian>(entry_count as u16).unwrap();
            eocd.write_u32::<LittleEndian>(cd_size as u32).unwrap();
            eocd.write_u32::<LittleEndian>(cd_start_offset as u32).unwrap();
        }
        eocd.write_u16::<LittleEndian>(comment.len() as u16).unwrap();
        eocd.extend_from_slice(comment.as_bytes());

        out.write_all(&eocd)
            .map_err(|e| TorrentZipError::Io(tmp_path.display().to_string(), e))?;
        out.flush().map_err(|e| TorrentZipError::Io(tmp_path.display().to_string(), e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_members_produce_identical_bytes_regardless_of_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.zip");
        let path_b = dir.path().join("b.zip");

        let forward = vec![
            TorrentZipEntry::new("b.bin", b"second".to_vec()),
            TorrentZipEntry::new("a.bin", b"first".to_vec()),
        ];
        let reversed = vec![
            TorrentZipEntry::new("a.bin", b"first".to_vec()),
            TorrentZipEntry::new("b.bin", b"second".to_vec()),
        ];

        TorrentZipWriter::write_to_path(&path_a, forward).unwrap();
        TorrentZipWriter::write_to_path(&path_b, reversed).unwrap();

        assert_eq!(std::fs::read(&path_a).unwrap(), std::fs::read(&path_b).unwrap());
    }

    #[test]
    fn written_archive_round_trips_through_the_zip_crate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.zip");
        TorrentZipWriter::write_to_path(
            &path,
            vec![
                TorrentZipEntry::new("Game.nes", b"rom bytes".to_vec()),
                TorrentZipEntry::new("readme.txt", b"hello".to_vec()),
            ],
        )
        .unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 2);

        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Game.nes".to_string(), "readme.txt".to_string()]);

        let mut contents = String::new();
        use std::io::Read;
        archive.by_name("readme.txt").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.zip");
        let result = TorrentZipWriter::write_to_path(
            &path,
            vec![
                TorrentZipEntry::new("a.bin", b"1".to_vec()),
                TorrentZipEntry::new("a.bin", b"2".to_vec()),
            ],
        );
        assert!(matches!(result, Err(TorrentZipError::DuplicateName(_))));
        assert!(!path.exists());
    }

    #[test]
    fn failed_write_does_not_leave_a_temp_file_behind() {
        // Writing into a directory that doesn't exist fails at file creation time.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-subdir").join("out.zip");
        let result = TorrentZipWriter::write_to_path(&path, vec![TorrentZipEntry::new("a.bin", vec![1, 2, 3])]);
        assert!(result.is_err());
        assert!(!dir.path().join("missing-subdir").join("out.zip.torrentzip-tmp").exists());
    }

    #[test]
    fn eocd_comment_carries_central_directory_crc32() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commented.zip");
        TorrentZipWriter::write_to_path(&path, vec![TorrentZipEntry::new("a.bin", vec![1, 2, 3])]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let comment = String::from_utf8(bytes[bytes.len() - 22..].to_vec()).unwrap();
        assert!(comment.starts_with("TORRENTZIPPED-"));
        assert_eq!(comment.len(), "TORRENTZIPPED-".len() + 8);
    }
}
