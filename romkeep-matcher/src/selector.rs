// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The Candidate Selector: groups matched records by Catalog Entry, applies
include/exclude filters, and (in 1G1R "single" mode) picks at most one
candidate per underlying title using a [`PreferenceVector`].

Pure and deterministic given the same [`PreferenceVector`] and [`FilterSet`],
per spec.md §4.7 and the permutation-invariance property in §8.
*/

use {
    crate::matcher::MatchedRecord,
    regex::Regex,
    romkeep_catalog::{CatalogIndex, PreferenceVector, RomRef},
};

/// Include/exclude filters applied before preference ranking.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub include_regex: Option<Regex>,
    pub exclude_regex: Option<Regex>,
    pub bios_only: bool,
    pub device_only: bool,
    pub allow_unlicensed: bool,
    pub allow_bad_dump: bool,
}

impl FilterSet {
    fn admits(&self, index: &CatalogIndex, romref: RomRef) -> bool {
        let entry = index.entry(romref.0);

        if let Some(re) = &self.include_regex {
            if !re.is_match(&entry.game.name) {
                return false;
            }
        }
        if let Some(re) = &self.exclude_regex {
            if re.is_match(&entry.game.name) {
                return false;
            }
        }
        if self.bios_only && !entry.game.is_bios() {
            return false;
        }
        if self.device_only && !entry.game.is_device() {
            return false;
        }
        if !self.allow_unlicensed && entry.tokens.is_unlicensed {
            return false;
        }
        if !self.allow_bad_dump {
            let rom = index.rom(romref);
            if rom.is_bad_dump() {
                return false;
            }
        }

        true
    }
}

/// A single chosen (or passed-through) pairing of a catalog entry with the
/// scanned record that will realize it.
#[derive(Debug, Clone)]
pub struct SelectedCandidate {
    pub romref: RomRef,
    pub record: MatchedRecord,
}

/// Select candidates across an entire match outcome.
///
/// When `single_mode` is off, every filter-admitted (entry, record) pairing
/// is kept. When on, candidates are first grouped by their entry's
/// normalized title (stripping region/language/revision tags), then
/// [`PreferenceVector::select_best`] picks at most one entry per title group,
/// and within the winning entry the first admitted record is kept.
pub fn select(
    matched: &[MatchedRecord],
    index: &CatalogIndex,
    filters: &FilterSet,
    preferences: &PreferenceVector,
    single_mode: bool,
) -> Vec<SelectedCandidate> {
    let mut admitted: Vec<SelectedCandidate> = Vec::new();
    for record in matched {
        for &romref in &record.romrefs {
            if filters.admits(index, romref) {
                admitted.push(SelectedCandidate {
                    romref,
                    record: record.clone(),
                });
            }
        }
    }

    if !single_mode {
        return admitted;
    }

    let mut titles: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<&SelectedCandidate>> = std::collections::HashMap::new();
    for candidate in &admitted {
        let entry = index.entry(candidate.romref.0);
        let title = romkeep_catalog::normalize_name(&entry.game.name);
        if !groups.contains_key(&title) {
            titles.push(title.clone());
        }
        groups.entry(title).or_default().push(candidate);
    }
    titles.sort();

    let mut winners = Vec::new();
    for title in titles {
        let candidates = &groups[&title];
        let entries: Vec<_> = candidates.iter().map(|c| index.entry(c.romref.0)).collect();
        let Some(winning_entry) = preferences.select_best(&entries) else {
            continue;
        };

        if let Some(winner) = candidates
            .iter()
            .find(|c| std::ptr::eq(index.entry(c.romref.0), winning_entry))
        {
            winners.push((*winner).clone());
        }
    }

    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchBasis;
    use crate::record::RawRecord;
    use romkeep_catalog::{CatalogFormat, DatFile};
    use romkeep_digest::Digest;
    use std::path::PathBuf;

    fn record(name: &str) -> RawRecord {
        RawRecord {
            source_path: PathBuf::from(name),
            enclosing_archive: None,
            inner_entry: None,
            size: 10,
            digest: Digest::default(),
            header: None,
            modified_unix: 0,
        }
    }

    fn three_region_index() -> CatalogIndex {
        let xml = r#"<?xml version="1.0"?>
<datafile>
  <header><name>Sample</name></header>
  <game name="Game C (USA)"><rom name="a.bin" size="10"/></game>
  <game name="Game C (Europe)"><rom name="b.bin" size="10"/></game>
  <game name="Game C (Japan)"><rom name="c.bin" size="10"/></game>
</datafile>"#;
        let dat = DatFile::parse(xml.as_bytes(), CatalogFormat::Xml).unwrap();
        let mut index = CatalogIndex::new();
        index.ingest("Sample", dat);
        index
    }

    #[test]
    fn single_mode_keeps_one_preferred_region() {
        let index = three_region_index();
        let matched: Vec<MatchedRecord> = (0..3)
            .map(|i| MatchedRecord {
                record: record(&format!("r{i}")),
                basis: MatchBasis::NameSize,
                romrefs: vec![(i, 0)],
            })
            .collect();

        let preferences = PreferenceVector::new(vec!["USA".to_string()], vec![]);
        let selected = select(&matched, &index, &FilterSet::default(), &preferences, true);

        assert_eq!(selected.len(), 1);
        assert_eq!(index.entry(selected[0].romref.0).game.name, "Game C (USA)");
    }

    #[test]
    fn non_single_mode_keeps_all_admitted_candidates() {
        let index = three_region_index();
        let matched: Vec<MatchedRecord> = (0..3)
            .map(|i| MatchedRecord {
                record: record(&format!("r{i}")),
                basis: MatchBasis::NameSize,
                romrefs: vec![(i, 0)],
            })
            .collect();

        let preferences = PreferenceVector::new(vec!["USA".to_string()], vec![]);
        let selected = select(&matched, &index, &FilterSet::default(), &preferences, false);

        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn bad_dump_excluded_unless_allowed() {
        let xml = r#"<?xml version="1.0"?>
<datafile>
  <header><name>Sample</name></header>
  <game name="Game A (USA)"><rom name="a.bin" size="10" status="baddump"/></game>
</datafile>"#;
        let dat = DatFile::parse(xml.as_bytes(), CatalogFormat::Xml).unwrap();
        let mut index = CatalogIndex::new();
        index.ingest("Sample", dat);

        let matched = vec![MatchedRecord {
            record: record("a"),
            basis: MatchBasis::NameSize,
            romrefs: vec![(0, 0)],
        }];

        let preferences = PreferenceVector::default();
        let selected = select(&matched, &index, &FilterSet::default(), &preferences, false);
        assert!(selected.is_empty());

        let filters = FilterSet {
            allow_bad_dump: true,
            ..FilterSet::default()
        };
        let selected = select(&matched, &index, &filters, &preferences, false);
        assert_eq!(selected.len(), 1);
    }
}
