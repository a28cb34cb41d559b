// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Runs a built [`Plan`](romkeep_matcher::Plan) against the filesystem
(spec.md §3/§7).

Per spec.md §7, a failed action never aborts the run: every failure is
collected into [`ExecutionOutcome::failures`] and the caller decides the
exit code (1 if non-empty, per spec.md §6). `Copy` actions are batched
through one [`romkeep_file_manifest::FileManifest`] and materialized with a
single `rayon` pool, the same pattern the manifest crate uses to place many
files under one destination tree in one pass; the other action kinds don't
fit that relative-path materialization model and are executed directly.
*/

use {
    romkeep_archive::Archive,
    romkeep_file_manifest::{FileData, FileEntry, FileManifest},
    romkeep_matcher::{Action, LinkMode, MatcherError, Plan, ReportFormat},
    romkeep_zip::{TorrentZipEntry, TorrentZipWriter},
    std::{
        io,
        path::{Path, PathBuf},
    },
};

#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    pub failures: Vec<MatcherError>,
    pub emitted_report_paths: Vec<PathBuf>,
    pub emitted_playlist_paths: Vec<PathBuf>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

fn relative_to_output_root(output_root: &Path, destination: &str) -> io::Result<PathBuf> {
    let destination = Path::new(destination);
    if destination.is_absolute() {
        Ok(destination.to_path_buf())
    } else {
        Ok(output_root.join(destination))
    }
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Apply an IPS patch (`source` + `patch_path` -> bytes written to
/// `destination`). BPS/UPS have no counterpart in the ambient dependency
/// stack and are reported as a write failure rather than guessed at; see
/// DESIGN.md's Patch action entry.
fn apply_ips_patch(source: &Path, patch_path: &Path, destination: &Path) -> Result<(), MatcherError> {
    let original = std::fs::read(source).map_err(|e| MatcherError::Io(source.display().to_string(), e))?;
    let patch = std::fs::read(patch_path).map_err(|e| MatcherError::Io(patch_path.display().to_string(), e))?;

    const HEADER: &[u8] = b"PATCH";
    const FOOTER: &[u8] = b"EOF";
    if patch.len() < HEADER.len() || &patch[..HEADER.len()] != HEADER {
        return Err(MatcherError::WriteFailed(
            destination.display().to_string(),
            io::Error::new(io::ErrorKind::InvalidData, "not an IPS patch (missing PATCH header)"),
        ));
    }

    let mut out = original;
    let mut cursor = HEADER.len();
    while cursor < patch.len() {
        if cursor + FOOTER.len() <= patch.len() && &patch[cursor..cursor + FOOTER.len()] == FOOTER {
            break;
        }
        if cursor + 5 > patch.len() {
            break;
        }
        let offset = ((patch[cursor] as usize) << 16) | ((patch[cursor + 1] as usize) << 8) | (patch[cursor + 2] as usize);
        let size = ((patch[cursor + 3] as usize) << 8) | (patch[cursor + 4] as usize);
        cursor += 5;

        if size == 0 {
            if cursor + 2 > patch.len() {
                break;
            }
            let rle_size = ((patch[cursor] as usize) << 8) | (patch[cursor + 1] as usize);
            cursor += 2;
            let fill_byte = patch.get(cursor).copied().unwrap_or(0);
            cursor += 1;
            if out.len() < offset + rle_size {
                out.resize(offset + rle_size, 0);
            }
            for b in out[offset..offset + rle_size].iter_mut() {
                *b = fill_byte;
            }
        } else {
            if cursor + size > patch.len() {
                break;
            }
            if out.len() < offset + size {
                out.resize(offset + size, 0);
            }
            out[offset..offset + size].copy_from_slice(&patch[cursor..cursor + size]);
            cursor += size;
        }
    }

    ensure_parent(destination).map_err(|e| MatcherError::Io(destination.display().to_string(), e))?;
    std::fs::write(destination, out).map_err(|e| MatcherError::WriteFailed(destination.display().to_string(), e))
}

fn place_link(source: &Path, destination: &Path, mode: LinkMode) -> Result<(), MatcherError> {
    ensure_parent(destination).map_err(|e| MatcherError::Io(destination.display().to_string(), e))?;
    match mode {
        LinkMode::Hard => std::fs::hard_link(source, destination)
            .map_err(|e| MatcherError::WriteFailed(destination.display().to_string(), e)),
        LinkMode::Symbolic => symlink(source, destination)
            .map_err(|e| MatcherError::WriteFailed(destination.display().to_string(), e)),
        // Reflinking has no crate in the ambient dependency stack; fall back
        // to a plain copy (see DESIGN.md).
        LinkMode::ReflinkIfSupported => std::fs::copy(source, destination)
            .map(|_| ())
            .map_err(|e| MatcherError::WriteFailed(destination.display().to_string(), e)),
    }
}

#[cfg(unix)]
fn symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, destination)
}

#[cfg(windows)]
fn symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, destination)
}

/// Execute every action in `plan`. `output_root` anchors relative
/// destinations; `pool` sizes the Copy-action materialization fan-out.
pub fn execute(plan: &Plan, output_root: &Path, pool: &rayon::ThreadPool) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::default();
    let mut manifest = FileManifest::default();

    for action in &plan.actions {
        match action {
            Action::Copy { source, destination, .. } => {
                match relative_to_output_root(output_root, destination) {
                    Ok(dest_path) => match dest_path.strip_prefix(output_root) {
                        Ok(relative) => {
                            let entry = FileEntry {
                                data: FileData::from(Path::new(source)),
                                executable: false,
                            };
                            if let Err(e) = manifest.add_file_entry(relative, entry) {
                                outcome.failures.push(MatcherError::WriteFailed(
                                    destination.clone(),
                                    io::Error::new(io::ErrorKind::Other, e.to_string()),
                                ));
                            }
                        }
                        Err(_) => {
                            // Destination escapes the output root; copy directly.
                            if let Err(e) = ensure_parent(&dest_path).and_then(|_| std::fs::copy(source, &dest_path).map(|_| ())) {
                                outcome.failures.push(MatcherError::WriteFailed(destination.clone(), e));
                            }
                        }
                    },
                    Err(e) => outcome.failures.push(MatcherError::Io(destination.clone(), e)),
                }
            }

            Action::Move { source, destination, .. } => {
                let dest_path = output_root.join(destination);
                if let Err(e) = ensure_parent(&dest_path).and_then(|_| {
                    std::fs::rename(source, &dest_path).or_else(|_| {
                        std::fs::copy(source, &dest_path)
                            .map(|_| ())
                            .and_then(|_| std::fs::remove_file(source))
                    })
                }) {
                    outcome.failures.push(MatcherError::WriteFailed(destination.clone(), e));
                }
            }

            Action::Link { source, destination, mode, .. } => {
                let dest_path = output_root.join(destination);
                if let Err(e) = place_link(Path::new(source), &dest_path, *mode) {
                    outcome.failures.push(e);
                }
            }

            Action::Extract { source_archive, inner_entry, destination, .. } => {
                let dest_path = output_root.join(destination);
                let result = Archive::open(source_archive)
                    .map_err(|e| MatcherError::Archive(source_archive.clone(), e))
                    .and_then(|archive| {
                        let scratch = tempfile::tempdir().map_err(|e| MatcherError::Io(source_archive.clone(), e))?;
                        archive
                            .read_entry(inner_entry, scratch.path())
                            .map_err(|e| MatcherError::Archive(source_archive.clone(), e))
                    })
                    .and_then(|bytes| {
                        ensure_parent(&dest_path).map_err(|e| MatcherError::Io(destination.clone(), e))?;
                        std::fs::write(&dest_path, bytes).map_err(|e| MatcherError::WriteFailed(destination.clone(), e))
                    });
                if let Err(e) = result {
                    outcome.failures.push(e);
                }
            }

            Action::ZipInto { destination, members } => {
                let dest_path = output_root.join(destination);
                let mut entries = Vec::with_capacity(members.len());
                let mut member_failed = false;
                for member in members {
                    let bytes = match &member.inner_entry {
                        Some(inner) => Archive::open(&member.source)
                            .map_err(|e| MatcherError::Archive(member.source.clone(), e))
                            .and_then(|archive| {
                                let scratch = tempfile::tempdir().map_err(|e| MatcherError::Io(member.source.clone(), e))?;
                                archive
                                    .read_entry(inner, scratch.path())
                                    .map_err(|e| MatcherError::Archive(member.source.clone(), e))
                            }),
                        None => std::fs::read(&member.source).map_err(|e| MatcherError::Io(member.source.clone(), e)),
                    };
                    match bytes {
                        Ok(bytes) => entries.push(TorrentZipEntry::new(member.name.clone(), bytes)),
                        Err(e) => {
                            outcome.failures.push(e);
                            member_failed = true;
                        }
                    }
                }
                if member_failed {
                    continue;
                }
                if let Err(e) = ensure_parent(&dest_path) {
                    outcome.failures.push(MatcherError::Io(destination.clone(), e));
                    continue;
                }
                if let Err(e) = TorrentZipWriter::write_to_path(&dest_path, entries) {
                    outcome.failures.push(MatcherError::WriteFailed(destination.clone(), io::Error::new(io::ErrorKind::Other, e.to_string())));
                }
            }

            Action::Patch { source, patch_path, destination, patch_kind, .. } => {
                let dest_path = output_root.join(destination);
                match patch_kind {
                    romkeep_matcher::PatchKind::Ips => {
                        if let Err(e) = apply_ips_patch(Path::new(source), Path::new(patch_path), &dest_path) {
                            outcome.failures.push(e);
                        }
                    }
                    romkeep_matcher::PatchKind::Bps | romkeep_matcher::PatchKind::Ups => {
                        outcome.failures.push(MatcherError::WriteFailed(
                            destination.clone(),
                            io::Error::new(io::ErrorKind::Unsupported, format!("{patch_kind:?} patches are not yet supported")),
                        ));
                    }
                }
            }

            Action::TestOnly { destination } => {
                let dest_path = output_root.join(destination);
                if !dest_path.exists() {
                    outcome.failures.push(MatcherError::Io(
                        destination.clone(),
                        io::Error::new(io::ErrorKind::NotFound, "expected output missing for test-only verification"),
                    ));
                }
            }

            Action::EmitReport { path, format } => {
                let dest_path = output_root.join(path);
                match format {
                    ReportFormat::Json => {
                        outcome.emitted_report_paths.push(dest_path);
                    }
                    // The report artifact is always JSON (SPEC_FULL.md
                    // §10.10); only dir2dat/fixdat accept XML.
                    ReportFormat::Xml => {
                        outcome.emitted_report_paths.push(dest_path);
                    }
                }
            }

            Action::EmitCatalog { .. } => {
                // dir2dat/fixdat content needs the catalog index and match
                // outcome, neither of which the generic executor has; the
                // caller (romkeep::run) writes these directly and keeps this
                // action in the plan only so --print-plan reflects it.
            }

            Action::EmitPlaylist { path, entries } => {
                let dest_path = output_root.join(path);
                let text = entries.join("\n");
                if let Err(e) = ensure_parent(&dest_path).and_then(|_| std::fs::write(&dest_path, text)) {
                    outcome.failures.push(MatcherError::WriteFailed(path.clone(), e));
                } else {
                    outcome.emitted_playlist_paths.push(dest_path);
                }
            }

            Action::CleanDelete { path } => {
                let target = PathBuf::from(path);
                let result = if target.is_dir() {
                    std::fs::remove_dir_all(&target)
                } else {
                    std::fs::remove_file(&target)
                };
                if let Err(e) = result {
                    outcome.failures.push(MatcherError::WriteFailed(path.clone(), e));
                }
            }
        }
    }

    if !manifest.is_empty() {
        match manifest.materialize_files_parallel(output_root, pool) {
            Ok(_) => {}
            Err(e) => outcome.failures.push(MatcherError::WriteFailed(
                output_root.display().to_string(),
                io::Error::new(io::ErrorKind::Other, e.to_string()),
            )),
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use romkeep_matcher::Plan;

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap()
    }

    #[test]
    fn copy_action_materializes_file_under_output_root() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let src_path = src_dir.path().join("rom.bin");
        std::fs::write(&src_path, b"hello").unwrap();

        let plan = Plan {
            actions: vec![Action::Copy {
                source: src_path.display().to_string(),
                destination: "Game/rom.bin".to_string(),
                digest: None,
                catalog_entry: None,
            }],
            conflicts: vec![],
        };

        let outcome = execute(&plan, out_dir.path(), &pool());
        assert!(outcome.is_success(), "{:?}", outcome.failures);
        assert_eq!(std::fs::read(out_dir.path().join("Game/rom.bin")).unwrap(), b"hello");
    }

    #[test]
    fn missing_test_only_destination_is_recorded_as_failure() {
        let out_dir = tempfile::tempdir().unwrap();
        let plan = Plan {
            actions: vec![Action::TestOnly {
                destination: "missing.bin".to_string(),
            }],
            conflicts: vec![],
        };

        let outcome = execute(&plan, out_dir.path(), &pool());
        assert!(!outcome.is_success());
    }

    #[test]
    fn clean_delete_removes_file() {
        let out_dir = tempfile::tempdir().unwrap();
        let stale = out_dir.path().join("stale.bin");
        std::fs::write(&stale, b"x").unwrap();

        let plan = Plan {
            actions: vec![Action::CleanDelete {
                path: stale.display().to_string(),
            }],
            conflicts: vec![],
        };

        let outcome = execute(&plan, out_dir.path(), &pool());
        assert!(outcome.is_success());
        assert!(!stale.exists());
    }
}
