// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! 7z reading via the external `7z`/`7za` command-line tool.

There is no pure-Rust 7z decoder in the dependency stack the rest of this
crate draws from, so this backend shells out. A missing binary is reported
as [`ArchiveError::BackendUnavailable`] rather than panicking or aborting the
whole run — callers treat archives needing this backend as unmatched rather
than failing the scan outright when neither `7z` nor `7za` is installed.
*/

use {
    crate::{
        entry::ArchiveEntry,
        error::{ArchiveError, Result},
    },
    std::{
        path::{Path, PathBuf},
        process::{Command, Output},
    },
};

/// Candidate binary names tried in order; the first one found on `PATH` is
/// used for the lifetime of a [`SevenZipReader`].
const CANDIDATE_BINARIES: &[&str] = &["7z", "7za"];

pub struct SevenZipReader {
    path: PathBuf,
}

fn run(binary: &str, args: &[&str]) -> Result<Output> {
    match Command::new(binary).args(args).output() {
        Ok(output) => Ok(output),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ArchiveError::BackendUnavailable(binary.to_string()))
        }
        Err(e) => Err(ArchiveError::Io(binary.to_string(), e)),
    }
}

fn first_available_binary() -> Result<&'static str> {
    for candidate in CANDIDATE_BINARIES {
        match Command::new(candidate).arg("--help").output() {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(_) => return Ok(candidate),
        }
    }
    Err(ArchiveError::BackendUnavailable(CANDIDATE_BINARIES.join(" or ")))
}

/// Parse `7z l -slt` output into entries. The format is a series of
/// `Key = Value` lines grouped into blocks by blank lines, one block per
/// archive member, after a header block we skip by requiring `Path =`.
fn parse_slt_listing(stdout: &str) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    let mut name: Option<String> = None;
    let mut size: Option<u64> = None;
    let mut crc32: Option<u32> = None;
    let mut is_dir = false;
    // The first "Path = " block in `-slt` output describes the archive
    // itself (it carries a "Type" field); it is not a member and must not
    // be reported as one.
    let mut is_header_block = false;

    let flush = |name: &mut Option<String>,
                 size: &mut Option<u64>,
                 crc32: &mut Option<u32>,
                 is_dir: &mut bool,
                 is_header_block: &mut bool,
                 entries: &mut Vec<ArchiveEntry>| {
        if let Some(n) = name.take() {
            if !*is_header_block {
                entries.push(ArchiveEntry {
                    name: n,
                    size: size.take().unwrap_or(0),
                    crc32: crc32.take(),
                    is_dir: *is_dir,
                });
            }
        }
        *is_dir = false;
        *is_header_block = false;
    };

    for line in stdout.lines() {
        if line.trim().is_empty() {
            flush(&mut name, &mut size, &mut crc32, &mut is_dir, &mut is_header_block, &mut entries);
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "Path" => {
                flush(&mut name, &mut size, &mut crc32, &mut is_dir, &mut is_header_block, &mut entries);
                name = Some(value.to_string());
            }
            "Type" => is_header_block = true,
            "Size" => size = value.parse::<u64>().ok(),
            "CRC" if !value.is_empty() => crc32 = u32::from_str_radix(value, 16).ok(),
            "Attributes" => is_dir = value.contains('D'),
            _ => {}
        }
    }
    flush(&mut name, &mut size, &mut crc32, &mut is_dir, &mut is_header_block, &mut entries);

    if entries.is_empty() {
        return Err(ArchiveError::BackendOutputUnparseable(stdout.to_string()));
    }

    Ok(entries)
}

impl SevenZipReader {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn list(&self) -> Result<Vec<ArchiveEntry>> {
        let binary = first_available_binary()?;
        let path_str = self.path.display().to_string();
        let output = run(binary, &["l", "-slt", path_str.as_str()])?;
        if !output.status.success() {
            return Err(ArchiveError::BackendFailed(
                binary.to_string(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        parse_slt_listing(&String::from_utf8_lossy(&output.stdout))
    }

    /// Extract every member to `dest`. 7z's listing doesn't always expose
    /// per-member extraction without re-invoking the tool once per member,
    /// so this always does a full-archive extract.
    pub fn extract_all(&self, dest: impl AsRef<Path>) -> Result<()> {
        let binary = first_available_binary()?;
        let dest = dest.as_ref();
        std::fs::create_dir_all(dest).map_err(|e| ArchiveError::Io(dest.display().to_string(), e))?;

        let path_str = self.path.display().to_string();
        let out_arg = format!("-o{}", dest.display());
        let output = run(binary, &["x", out_arg.as_str(), "-y", path_str.as_str()])?;
        if !output.status.success() {
            return Err(ArchiveError::BackendFailed(
                binary.to_string(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slt_listing_with_two_members() {
        let sample = "7-Zip [64] some version\n\
                       \n\
                       Listing archive: sample.7z\n\
                       \n\
                       --\n\
                       Path = sample.7z\n\
                       Type = 7z\n\
                       \n\
                       Path = game.nes\n\
                       Size = 131088\n\
                       Attributes = A\n\
                       CRC = DEADBEEF\n\
                       \n\
                       Path = sub\n\
                       Attributes = D\n\
                       \n";

        let entries = parse_slt_listing(sample).unwrap();
        let game = entries.iter().find(|e| e.name == "game.nes").unwrap();
        assert_eq!(game.size, 131_088);
        assert_eq!(game.crc32, Some(0xdeadbeef));
        assert!(!game.is_dir);

        let dir_entry = entries.iter().find(|e| e.name == "sub").unwrap();
        assert!(dir_entry.is_dir);
    }

    #[test]
    fn empty_listing_is_unparseable_error() {
        assert!(matches!(
            parse_slt_listing(""),
            Err(ArchiveError::BackendOutputUnparseable(_))
        ));
    }
}
