// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The Report artifact (spec.md §6): per-catalog-entry match status and
per-input disposition for one run, serialized to JSON (SPEC_FULL.md §10.10
fixes JSON as the only report format, unlike dir2dat/fixdat which also
accept XML).
*/

use {
    romkeep_catalog::CatalogIndex,
    romkeep_matcher::{Conflict, MatchBasis, MatchOutcome, SelectedCandidate},
    serde::Serialize,
    std::collections::HashSet,
};

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntryStatus {
    pub catalog_name: String,
    pub entry_name: String,
    pub matched: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum InputDisposition {
    Matched {
        path: String,
        basis: &'static str,
        catalog_entries: Vec<String>,
    },
    Unmatched {
        path: String,
    },
}

fn basis_label(basis: MatchBasis) -> &'static str {
    match basis {
        MatchBasis::Sha256 => "sha256",
        MatchBasis::Sha1 => "sha1",
        MatchBasis::Md5 => "md5",
        MatchBasis::Crc32Size => "crc32+size",
        MatchBasis::NameSize => "name+size",
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub catalog_entries: Vec<CatalogEntryStatus>,
    pub inputs: Vec<InputDisposition>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
    pub action_failures: Vec<String>,
}

/// Assemble the report from the pieces the run pipeline already produced:
/// the catalog index (for entry names), the raw match outcome (for
/// per-input disposition), the selected candidates (for which entries were
/// actually chosen to be realized), the plan's conflicts, and any
/// accumulated warnings/failures.
pub fn build_summary(
    index: &CatalogIndex,
    match_outcome: &MatchOutcome,
    selected: &[SelectedCandidate],
    conflicts: &[Conflict],
    warnings: Vec<String>,
    action_failures: Vec<String>,
) -> RunSummary {
    let selected_romrefs: HashSet<(usize, usize)> = selected.iter().map(|c| c.romref).collect();
    let matched_entry_indices: HashSet<usize> = match_outcome
        .matched
        .iter()
        .flat_map(|m| m.romrefs.iter().map(|r| r.0))
        .collect();

    let catalog_entries = index
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| CatalogEntryStatus {
            catalog_name: entry.catalog_name.clone(),
            entry_name: entry.game.name.clone(),
            matched: matched_entry_indices.contains(&i),
            selected: selected_romrefs.iter().any(|r| r.0 == i),
        })
        .collect();

    let mut inputs: Vec<InputDisposition> = Vec::new();
    for matched in &match_outcome.matched {
        let catalog_entries = matched
            .romrefs
            .iter()
            .map(|romref| {
                let entry = index.entry(romref.0);
                format!("{}/{}", entry.catalog_name, entry.game.name)
            })
            .collect();
        inputs.push(InputDisposition::Matched {
            path: matched.record.display_path(),
            basis: basis_label(matched.basis),
            catalog_entries,
        });
    }
    for record in &match_outcome.unmatched {
        inputs.push(InputDisposition::Unmatched {
            path: record.display_path(),
        });
    }

    RunSummary {
        catalog_entries,
        inputs,
        conflicts: conflicts.to_vec(),
        warnings,
        action_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use romkeep_catalog::{CatalogFormat, DatFile};
    use romkeep_digest::Digest;
    use romkeep_matcher::{MatchedRecord, RawRecord};
    use std::path::PathBuf;

    fn sample_index() -> CatalogIndex {
        let xml = r#"<?xml version="1.0"?>
<datafile>
  <header><name>Sample</name></header>
  <game name="Game A (USA)"><rom name="a.bin" size="10" crc="0d4a1185"/></game>
</datafile>"#;
        let dat = DatFile::parse(xml.as_bytes(), CatalogFormat::Xml).unwrap();
        let mut index = CatalogIndex::new();
        index.ingest("Sample", dat);
        index
    }

    #[test]
    fn matched_entry_is_reflected_in_catalog_entry_status() {
        let index = sample_index();
        let record = RawRecord {
            source_path: PathBuf::from("a.bin"),
            enclosing_archive: None,
            inner_entry: None,
            size: 10,
            digest: Digest::default(),
            header: None,
            modified_unix: 0,
        };
        let matched = MatchedRecord {
            record,
            basis: MatchBasis::Crc32Size,
            romrefs: vec![(0, 0)],
        };
        let outcome = MatchOutcome {
            matched: vec![matched.clone()],
            unmatched: vec![],
        };
        let selected = vec![SelectedCandidate {
            romref: (0, 0),
            record: matched,
        }];

        let summary = build_summary(&index, &outcome, &selected, &[], vec![], vec![]);
        assert_eq!(summary.catalog_entries.len(), 1);
        assert!(summary.catalog_entries[0].matched);
        assert!(summary.catalog_entries[0].selected);
        assert_eq!(summary.inputs.len(), 1);
    }
}
