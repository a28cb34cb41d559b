// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The 1-game-1-ROM preference vector: the user-configurable ranking used to
pick a single preferred release out of a group of otherwise-equivalent
catalog entries (same underlying title, different region/language/revision).

[`PreferenceVector`] only implements the *comparison*; grouping entries by
underlying title and applying the comparison across a group is the job of
the candidate selector built on top of this crate.
*/

use {crate::index::CatalogEntry, std::cmp::Ordering};

/// Whether among same-title candidates the newest or oldest revision wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionOrder {
    PreferNewest,
    PreferOldest,
}

impl Default for RevisionOrder {
    fn default() -> Self {
        RevisionOrder::PreferNewest
    }
}

/// The ranking rules applied across a group of candidate releases.
///
/// `regions` and `languages` are ordered most-preferred-first; a region or
/// language absent from the list ranks behind every listed one but is not
/// excluded unless `only_retail`/an explicit filter says otherwise.
#[derive(Debug, Clone, Default)]
pub struct PreferenceVector {
    pub regions: Vec<String>,
    pub languages: Vec<String>,
    pub only_retail: bool,
    pub prefer_verified: bool,
    pub revision_order: RevisionOrder,
}

impl PreferenceVector {
    pub fn new(regions: Vec<String>, languages: Vec<String>) -> Self {
        Self {
            regions,
            languages,
            ..Self::default()
        }
    }

    fn region_rank(&self, entry: &CatalogEntry) -> usize {
        entry
            .tokens
            .regions
            .iter()
            .filter_map(|r| self.regions.iter().position(|pref| pref == r))
            .min()
            .unwrap_or(usize::MAX)
    }

    fn language_rank(&self, entry: &CatalogEntry) -> usize {
        entry
            .tokens
            .languages
            .iter()
            .filter_map(|l| self.languages.iter().position(|pref| pref == l))
            .min()
            .unwrap_or(usize::MAX)
    }

    fn verified_rank(&self, entry: &CatalogEntry) -> u8 {
        if !self.prefer_verified {
            return 0;
        }
        if entry.game.roms.iter().any(|r| r.is_bad_dump()) {
            1
        } else {
            0
        }
    }

    fn revision_rank(&self, entry: &CatalogEntry) -> i64 {
        let revision = entry.tokens.revision.unwrap_or(0) as i64;
        match self.revision_order {
            RevisionOrder::PreferNewest => -revision,
            RevisionOrder::PreferOldest => revision,
        }
    }

    /// Whether `entry` survives the `only_retail` filter, if set.
    pub fn admits(&self, entry: &CatalogEntry) -> bool {
        !self.only_retail || entry.tokens.is_retail()
    }

    /// Order two candidates from most- to least-preferred. `Ordering::Less`
    /// means `a` is preferred over `b`.
    ///
    /// The comparison is a pure function of each entry's tokens and is
    /// therefore stable under any permutation of the input candidate list:
    /// sorting a group with this comparator always yields the same winner.
    pub fn compare(&self, a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
        self.region_rank(a)
            .cmp(&self.region_rank(b))
            .then_with(|| self.language_rank(a).cmp(&self.language_rank(b)))
            .then_with(|| self.verified_rank(a).cmp(&self.verified_rank(b)))
            .then_with(|| self.revision_rank(a).cmp(&self.revision_rank(b)))
            .then_with(|| crate::normalize::normalize_name(&a.game.name).cmp(&crate::normalize::normalize_name(&b.game.name)))
    }

    /// Pick the single most-preferred entry out of `candidates`, applying
    /// `only_retail` filtering first. Returns `None` if nothing admits.
    pub fn select_best<'a>(&self, candidates: &[&'a CatalogEntry]) -> Option<&'a CatalogEntry> {
        candidates
            .iter()
            .copied()
            .filter(|e| self.admits(e))
            .min_by(|a, b| self.compare(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::NameTokens;
    use crate::schema::Game;

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry {
            catalog_name: "Sample".to_string(),
            game: Game {
                name: name.to_string(),
                ..Game::default()
            },
            tokens: NameTokens::extract(name),
        }
    }

    #[test]
    fn prefers_listed_region_over_unlisted() {
        let prefs = PreferenceVector::new(vec!["USA".to_string()], vec![]);
        let usa = entry("Game (USA)");
        let eur = entry("Game (Europe)");
        assert_eq!(prefs.compare(&usa, &eur), Ordering::Less);
    }

    #[test]
    fn prefers_newest_revision_by_default() {
        let prefs = PreferenceVector::new(vec!["USA".to_string()], vec![]);
        let rev0 = entry("Game (USA)");
        let rev1 = entry("Game (USA) (Rev 1)");
        assert_eq!(prefs.compare(&rev1, &rev0), Ordering::Less);
    }

    #[test]
    fn prefer_oldest_flips_revision_order() {
        let mut prefs = PreferenceVector::new(vec!["USA".to_string()], vec![]);
        prefs.revision_order = RevisionOrder::PreferOldest;
        let rev0 = entry("Game (USA)");
        let rev1 = entry("Game (USA) (Rev 1)");
        assert_eq!(prefs.compare(&rev0, &rev1), Ordering::Less);
    }

    #[test]
    fn only_retail_excludes_beta() {
        let prefs = PreferenceVector {
            only_retail: true,
            ..PreferenceVector::new(vec!["USA".to_string()], vec![])
        };
        let beta = entry("Game (USA) (Beta)");
        assert!(!prefs.admits(&beta));
    }

    #[test]
    fn select_best_is_permutation_invariant() {
        let prefs = PreferenceVector::new(vec!["USA".to_string(), "EUR".to_string()], vec![]);
        let usa = entry("Game (USA)");
        let eur = entry("Game (Europe)");
        let jpn = entry("Game (Japan)");

        let forward = vec![&usa, &eur, &jpn];
        let reversed = vec![&jpn, &eur, &usa];

        let winner_forward = prefs.select_best(&forward).unwrap();
        let winner_reversed = prefs.select_best(&reversed).unwrap();
        assert_eq!(winner_forward.game.name, winner_reversed.game.name);
        assert_eq!(winner_forward.game.name, "Game (USA)");
    }
}
