// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Catalog-entry name normalization and tag tokenization.

Catalog entry names embed region/language/revision/type information as
parenthesized or bracketed tags, e.g. `"Game Title (USA) (En,Fr) (Rev 1)"`.
[`NameTokens::extract`] pulls those tags out; [`normalize_name`] produces the
canonical key used for (name, size) matching.
*/

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\(\[][^\)\]]*[\)\]]").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static REVISION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)rev\s*([0-9]+)").unwrap());

const KNOWN_REGIONS: &[(&str, &str)] = &[
    ("usa", "USA"),
    ("u", "USA"),
    ("europe", "EUR"),
    ("eur", "EUR"),
    ("e", "EUR"),
    ("japan", "JPN"),
    ("jpn", "JPN"),
    ("j", "JPN"),
    ("world", "World"),
    ("germany", "Germany"),
    ("france", "France"),
    ("spain", "Spain"),
    ("italy", "Italy"),
    ("australia", "Australia"),
    ("korea", "Korea"),
    ("china", "China"),
];

const KNOWN_LANGUAGES: &[&str] = &[
    "en", "fr", "de", "es", "it", "nl", "pt", "sv", "no", "da", "fi", "zh", "ja", "ko", "ru", "pl",
];

/// Region/language/revision/type tags parsed out of a catalog entry name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTokens {
    pub regions: Vec<String>,
    pub languages: Vec<String>,
    pub revision: Option<u32>,
    pub is_proto: bool,
    pub is_beta: bool,
    pub is_demo: bool,
    pub is_unlicensed: bool,
}

impl NameTokens {
    /// Whether this entry looks like a "retail"-grade release: not a proto,
    /// beta, demo, or explicitly unlicensed release.
    pub fn is_retail(&self) -> bool {
        !self.is_proto && !self.is_beta && !self.is_demo && !self.is_unlicensed
    }

    pub fn extract(name: &str) -> Self {
        let mut tokens = NameTokens::default();

        for capture in TAG_RE.find_iter(name) {
            let tag = capture.as_str().trim_matches(|c| c == '(' || c == ')' || c == '[' || c == ']');
            let lower = tag.to_ascii_lowercase();

            match lower.as_str() {
                "proto" | "prototype" => tokens.is_proto = true,
                "beta" => tokens.is_beta = true,
                "demo" | "sample" => tokens.is_demo = true,
                "unl" | "unlicensed" => tokens.is_unlicensed = true,
                _ => {}
            }

            if let Some(caps) = REVISION_RE.captures(tag) {
                if let Ok(n) = caps[1].parse::<u32>() {
                    tokens.revision = Some(n);
                }
            }

            for part in lower.split(|c: char| c == ',' || c == '+' || c == ' ') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }

                if let Some((_, canonical)) = KNOWN_REGIONS.iter().find(|(key, _)| *key == part) {
                    if !tokens.regions.iter().any(|r| r == canonical) {
                        tokens.regions.push(canonical.to_string());
                    }
                } else if KNOWN_LANGUAGES.contains(&part) {
                    let upper = part.to_string();
                    if !tokens.languages.iter().any(|l| l == &upper) {
                        tokens.languages.push(upper);
                    }
                }
            }
        }

        tokens
    }
}

/// Normalize a catalog/file name for (name, size) matching: lowercase, strip
/// all parenthesized/bracketed tags, strip file extension, collapse
/// whitespace.
pub fn normalize_name(name: &str) -> String {
    let without_ext = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };

    let without_tags = TAG_RE.replace_all(without_ext, " ");
    let lowered = without_tags.to_ascii_lowercase();
    WHITESPACE_RE.replace_all(lowered.trim(), " ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_basic_name() {
        assert_eq!(normalize_name("Game Title (USA) (Rev 1).nes"), "game title");
    }

    #[test]
    fn normalize_strips_brackets_too() {
        assert_eq!(normalize_name("Game [b1][!].bin"), "game");
    }

    #[test]
    fn normalize_is_idempotent_on_already_clean_names() {
        assert_eq!(normalize_name("plain name"), "plain name");
    }

    #[test]
    fn extracts_region_and_revision() {
        let tokens = NameTokens::extract("Game Title (USA) (Rev 1)");
        assert_eq!(tokens.regions, vec!["USA".to_string()]);
        assert_eq!(tokens.revision, Some(1));
        assert!(tokens.is_retail());
    }

    #[test]
    fn extracts_languages() {
        let tokens = NameTokens::extract("Game Title (Europe) (En,Fr,De)");
        assert_eq!(tokens.regions, vec!["EUR".to_string()]);
        assert_eq!(tokens.languages, vec!["en", "fr", "de"]);
    }

    #[test]
    fn flags_non_retail_releases() {
        let tokens = NameTokens::extract("Game Title (USA) (Beta)");
        assert!(!tokens.is_retail());
        assert!(tokens.is_beta);
    }
}
