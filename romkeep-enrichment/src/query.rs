// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Query shapes and the resulting payload, shared by both metadata sources. */

use serde::{Deserialize, Serialize};

/// A checksum-based lookup query for Source H. Built from whatever subset of
/// digests a Raw Record has; `strongest` picks the one spec.md §4.11 ranks
/// highest (SHA-1, then MD5, then SHA-256).
#[derive(Debug, Clone, Default)]
pub struct ChecksumQuery {
    pub sha1: Option<String>,
    pub md5: Option<String>,
    pub sha256: Option<String>,
}

impl ChecksumQuery {
    /// The strongest available digest, as `(kind, hex)`. `kind` is also used
    /// as half of the cache key for enrichment payloads.
    pub fn strongest(&self) -> Option<(&'static str, &str)> {
        if let Some(v) = &self.sha1 {
            return Some(("sha1", v));
        }
        if let Some(v) = &self.md5 {
            return Some(("md5", v));
        }
        if let Some(v) = &self.sha256 {
            return Some(("sha256", v));
        }
        None
    }
}

/// A name-based lookup query for Source I.
#[derive(Debug, Clone)]
pub struct NameQuery {
    pub title: String,
    pub platform_slug: Option<String>,
}

/// An advisory metadata record attached to a matched or unmatched record.
/// Never changes match decisions (spec.md §4.11); `raw` retains the full
/// response body for callers that want fields this struct doesn't surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub raw: serde_json::Value,
}

/// Build the Source I retry ladder for `query`, per spec.md §4.11:
/// (normalized title + platform) → (title alone) → (progressively shorter
/// titles) → (single keyword for very short titles).
pub fn retry_ladder(query: &NameQuery) -> Vec<NameQuery> {
    let mut ladder = Vec::new();
    let words: Vec<&str> = query.title.split_whitespace().collect();

    if query.platform_slug.is_some() {
        ladder.push(query.clone());
    }

    ladder.push(NameQuery {
        title: query.title.clone(),
        platform_slug: None,
    });

    let mut truncated = words.clone();
    while truncated.len() > 1 {
        truncated.pop();
        let title = truncated.join(" ");
        ladder.push(NameQuery {
            title,
            platform_slug: None,
        });
    }

    if let Some(first) = words.first() {
        let keyword_query = NameQuery {
            title: first.to_string(),
            platform_slug: None,
        };
        if ladder.last().map(|q| q.title.as_str()) != Some(first) {
            ladder.push(keyword_query);
        }
    }

    ladder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strongest_prefers_sha1_over_md5_and_sha256() {
        let query = ChecksumQuery {
            sha1: Some("a".to_string()),
            md5: Some("b".to_string()),
            sha256: Some("c".to_string()),
        };
        assert_eq!(query.strongest(), Some(("sha1", "a")));
    }

    #[test]
    fn falls_back_through_md5_to_sha256() {
        let query = ChecksumQuery {
            sha256: Some("c".to_string()),
            ..ChecksumQuery::default()
        };
        assert_eq!(query.strongest(), Some(("sha256", "c")));
    }

    #[test]
    fn ladder_progressively_shortens_title() {
        let query = NameQuery {
            title: "Game Title Extended Edition".to_string(),
            platform_slug: Some("nes".to_string()),
        };
        let ladder = retry_ladder(&query);
        assert_eq!(ladder[0].title, "Game Title Extended Edition");
        assert_eq!(ladder[0].platform_slug.as_deref(), Some("nes"));
        assert_eq!(ladder[1].title, "Game Title Extended Edition");
        assert!(ladder[1].platform_slug.is_none());
        assert_eq!(ladder.last().unwrap().title, "Game");
    }

    #[test]
    fn single_word_title_ladder_has_no_duplicate_keyword_step() {
        let query = NameQuery {
            title: "Game".to_string(),
            platform_slug: None,
        };
        let ladder = retry_ladder(&query);
        assert_eq!(ladder.iter().filter(|q| q.title == "Game").count(), 1);
    }
}
