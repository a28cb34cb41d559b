// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Builds the `dir2dat`/`fixdat` catalog documents (spec.md §6): a
`dir2dat` lists the catalog entries actually realized by this run, a
`fixdat` lists the ones that weren't found in any input. Both reuse
[`romkeep_catalog::DatFile`]'s shape so they round-trip through the same
parser as any other catalog, and both accept either JSON or the logiqx XML
shape (SPEC_FULL.md §10.10).
*/

use {
    romkeep_catalog::{CatalogIndex, DatFile, DatHeader},
    romkeep_matcher::{MatchOutcome, ReportFormat, SelectedCandidate},
    std::collections::HashSet,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum CatalogDocError {
    #[error("could not serialize catalog document as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not serialize catalog document as XML: {0}")]
    Xml(#[from] serde_xml_rs::Error),
}

fn header(name: &str) -> DatHeader {
    DatHeader {
        name: name.to_string(),
        description: name.to_string(),
        version: "1.0".to_string(),
    }
}

/// Games actually selected and written out by this run.
pub fn build_dir2dat(index: &CatalogIndex, selected: &[SelectedCandidate]) -> DatFile {
    let selected_entries: HashSet<usize> = selected.iter().map(|c| c.romref.0).collect();
    let games = index
        .entries()
        .iter()
        .enumerate()
        .filter(|(i, _)| selected_entries.contains(i))
        .map(|(_, entry)| entry.game.clone())
        .collect();

    DatFile {
        header: header("romkeep dir2dat"),
        games,
    }
}

/// Catalog entries that had no matching input anywhere in this run's scan.
pub fn build_fixdat(index: &CatalogIndex, match_outcome: &MatchOutcome) -> DatFile {
    let matched_entries: HashSet<usize> = match_outcome
        .matched
        .iter()
        .flat_map(|m| m.romrefs.iter().map(|r| r.0))
        .collect();
    let games = index
        .entries()
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched_entries.contains(i))
        .map(|(_, entry)| entry.game.clone())
        .collect();

    DatFile {
        header: header("romkeep fixdat"),
        games,
    }
}

pub fn serialize(doc: &DatFile, format: ReportFormat) -> Result<String, CatalogDocError> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(doc)?),
        ReportFormat::Xml => Ok(serde_xml_rs::to_string(doc)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use romkeep_catalog::CatalogFormat;
    use romkeep_digest::Digest;
    use romkeep_matcher::{MatchBasis, MatchedRecord, RawRecord};
    use std::path::PathBuf;

    fn sample_index() -> CatalogIndex {
        let xml = r#"<?xml version="1.0"?>
<datafile>
  <header><name>Sample</name></header>
  <game name="Game A (USA)"><rom name="a.bin" size="10" crc="0d4a1185"/></game>
  <game name="Game B (USA)"><rom name="b.bin" size="20" crc="1234abcd"/></game>
</datafile>"#;
        let dat = DatFile::parse(xml.as_bytes(), CatalogFormat::Xml).unwrap();
        let mut index = CatalogIndex::new();
        index.ingest("Sample", dat);
        index
    }

    #[test]
    fn dir2dat_contains_only_selected_entries() {
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
        let selected = vec![SelectedCandidate {
            romref: (0, 0),
            record: matched,
        }];

        let doc = build_dir2dat(&index, &selected);
        assert_eq!(doc.games.len(), 1);
        assert_eq!(doc.games[0].name, "Game A (USA)");
    }

    #[test]
    fn fixdat_contains_only_unmatched_entries() {
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
            matched: vec![matched],
            unmatched: vec![],
        };

        let doc = build_fixdat(&index, &outcome);
        assert_eq!(doc.games.len(), 1);
        assert_eq!(doc.games[0].name, "Game B (USA)");
    }
}
