// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The Token Resolver: renders an output-path template against a chosen
candidate and its catalog entry, per spec.md §4.8.

Recognized tokens fall into four families:
 - catalog: `{datName}`, `{datDescription}`, `{region}`, `{language}`,
   `{genre}`, `{category}`, `{type}`
 - file: `{inputDirname}`, `{outputBasename}`, `{outputName}`, `{outputExt}`
 - hardware-profile: `{hwProfile}`, looked up in a per-platform routing table
 - literal path separators, passed through untouched

`region` and `language` may be multi-valued (a release can list more than one
language, a catalog entry rarely more than one region but the grammar treats
both symmetrically); when a template references either, the resolver
produces the Cartesian product of outputs rather than joining the values.
Unknown `{token}` placeholders are retained verbatim and reported as a
warning rather than treated as an error, since a stray/future token in a
user-supplied template shouldn't abort a run.
*/

use {once_cell::sync::Lazy, regex::Regex, std::collections::HashMap};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Za-z][A-Za-z0-9]*)\}").unwrap());

const MULTI_VALUED_TOKENS: &[&str] = &["region", "language"];

/// Everything the Token Resolver needs to render one candidate's output
/// path(s).
#[derive(Debug, Clone, Default)]
pub struct TokenContext {
    pub dat_name: String,
    pub dat_description: String,
    pub category: String,
    pub genre: String,
    pub type_tag: String,
    pub regions: Vec<String>,
    pub languages: Vec<String>,
    pub input_dirname: String,
    pub output_basename: String,
    pub output_name: String,
    pub output_ext: String,
    /// Routing table for `{hwProfile}`, keyed by catalog name or category;
    /// looked up with `dat_name` first, then `category`.
    pub hardware_profiles: HashMap<String, String>,
}

impl TokenContext {
    fn single_valued(&self, token: &str) -> Option<String> {
        match token {
            "datName" => Some(self.dat_name.clone()),
            "datDescription" => Some(self.dat_description.clone()),
            "genre" => Some(self.genre.clone()),
            "category" => Some(self.category.clone()),
            "type" => Some(self.type_tag.clone()),
            "inputDirname" => Some(self.input_dirname.clone()),
            "outputBasename" => Some(self.output_basename.clone()),
            "outputName" => Some(self.output_name.clone()),
            "outputExt" => Some(self.output_ext.clone()),
            "hwProfile" => self
                .hardware_profiles
                .get(&self.dat_name)
                .or_else(|| self.hardware_profiles.get(&self.category))
                .cloned(),
            _ => None,
        }
    }

    fn multi_values(&self, token: &str) -> Option<&[String]> {
        match token {
            "region" => Some(&self.regions),
            "language" => Some(&self.languages),
            _ => None,
        }
    }
}

/// The result of resolving a template: one path per Cartesian-product
/// expansion, plus any unknown-token warnings encountered.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPaths {
    pub paths: Vec<String>,
    pub warnings: Vec<String>,
}

/// Render `template` against `ctx`, expanding multi-valued tokens into the
/// Cartesian product of their values.
pub fn resolve(template: &str, ctx: &TokenContext) -> ResolvedPaths {
    let mut warnings = Vec::new();

    let mut present_multi: Vec<&str> = Vec::new();
    for capture in TOKEN_RE.captures_iter(template) {
        let name = &capture[1];
        if MULTI_VALUED_TOKENS.contains(&name) && !present_multi.contains(&name) {
            present_multi.push(name);
        }
    }

    let value_lists: Vec<Vec<String>> = present_multi
        .iter()
        .map(|name| {
            let values = ctx.multi_values(name).unwrap_or(&[]);
            if values.is_empty() {
                vec![String::new()]
            } else {
                values.to_vec()
            }
        })
        .collect();

    let combinations = cartesian_product(&value_lists);

    let mut paths = Vec::new();
    for combo in &combinations {
        let assignment: HashMap<&str, &str> = present_multi
            .iter()
            .copied()
            .zip(combo.iter().map(|s| s.as_str()))
            .collect();

        let mut unknown_tokens_this_pass = Vec::new();
        let rendered = TOKEN_RE.replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            if let Some(value) = assignment.get(name) {
                return value.to_string();
            }
            if let Some(value) = ctx.single_valued(name) {
                return value;
            }
            unknown_tokens_this_pass.push(name.to_string());
            caps[0].to_string()
        });

        for token in unknown_tokens_this_pass {
            let message = format!("unknown token {{{token}}} retained verbatim");
            if !warnings.contains(&message) {
                warnings.push(message);
            }
        }

        paths.push(rendered.into_owned());
    }

    if paths.is_empty() {
        paths.push(template.to_string());
    }

    ResolvedPaths { paths, warnings }
}

fn cartesian_product(lists: &[Vec<String>]) -> Vec<Vec<String>> {
    lists.iter().fold(vec![Vec::new()], |acc, list| {
        acc.into_iter()
            .flat_map(|prefix| {
                list.iter().map(move |value| {
                    let mut extended = prefix.clone();
                    extended.push(value.clone());
                    extended
                })
            })
            .collect()
    })
}
