// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Orchestration: wires the Scanner, Matcher, Selector, Token Resolver,
Plan Builder, and Executor together into one run (spec.md §§4, 6).

Catalog parsing happens first since spec.md §7 makes catalog exhaustion
(every catalog file fails to parse) a fatal, exit-3 condition; everything
after that accumulates warnings/failures rather than aborting.
*/

use {
    crate::{config::RunConfig, executor, report},
    romkeep_cache::Cache,
    romkeep_catalog::CatalogIndex,
    romkeep_enrichment::{
        enrich, ChecksumQuery, HttpSourceHClient, HttpSourceIClient, NameMetadataClient, NameQuery,
    },
    romkeep_matcher::{build_plan, match_all, resolve_token_template, select, Action, CatalogKind, PlanItem, ReportFormat, TokenContext},
    std::{
        collections::HashMap,
        path::{Path, PathBuf},
        sync::Mutex,
    },
};

fn type_tag_for(tokens: &romkeep_catalog::NameTokens) -> &'static str {
    if tokens.is_proto {
        "proto"
    } else if tokens.is_beta {
        "beta"
    } else if tokens.is_demo {
        "demo"
    } else {
        "retail"
    }
}

fn token_context_for(entry: &romkeep_catalog::CatalogEntry, record: &romkeep_matcher::RawRecord) -> TokenContext {
    let match_name = record.match_name();
    let output_ext = PathBuf::from(&match_name)
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let output_basename = PathBuf::from(&match_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or(match_name.clone());
    let input_dirname = record
        .source_path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    TokenContext {
        dat_name: entry.catalog_name.clone(),
        dat_description: entry.game.description.clone(),
        category: entry.game.category.clone().unwrap_or_default(),
        genre: entry.game.category.clone().unwrap_or_default(),
        type_tag: type_tag_for(&entry.tokens).to_string(),
        regions: entry.tokens.regions.clone(),
        languages: entry.tokens.languages.clone(),
        input_dirname,
        output_basename,
        output_name: match_name,
        output_ext,
        hardware_profiles: HashMap::new(),
    }
}

/// Serializes a `dir2dat`/`fixdat` document and writes it to `path`,
/// recording any failure as a warning rather than aborting the run (spec.md
/// §7: only `ConfigError` and catalog exhaustion are fatal).
fn write_catalog_doc(
    path: &str,
    doc: &romkeep_catalog::DatFile,
    format: ReportFormat,
    warnings: &mut Vec<String>,
) {
    let text = match crate::catalog_doc::serialize(doc, format) {
        Ok(text) => text,
        Err(e) => {
            warnings.push(format!("could not serialize catalog document for {path}: {e}"));
            return;
        }
    };
    let dest = PathBuf::from(path);
    if let Some(parent) = dest.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warnings.push(format!("could not create parent directory for {path}: {e}"));
            return;
        }
    }
    if let Err(e) = std::fs::write(&dest, text) {
        warnings.push(format!("could not write catalog document to {path}: {e}"));
    }
}

/// The output root is the maximal literal (no `{token}`) prefix of the
/// output template's path components, e.g. `/roms/{datName}/{outputName}`
/// yields `/roms`. Scoping `--clean` to anything wider than this would walk
/// directories the plan never touches.
fn literal_output_root(template: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for component in Path::new(template).components() {
        if component.as_os_str().to_string_lossy().contains('{') {
            break;
        }
        root.push(component.as_os_str());
    }
    if root.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        root
    }
}

fn existing_paths_under(root: &std::path::Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Run the full pipeline and return the process exit code.
pub fn run(
    config: &RunConfig,
    dir2dat_path: Option<String>,
    fixdat_path: Option<String>,
    catalog_format: ReportFormat,
) -> i32 {
    let mut index = CatalogIndex::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut usable_catalogs = 0usize;

    for catalog_path in &config.catalogs {
        match index.ingest_path(catalog_path) {
            Ok(entry_warnings) => {
                usable_catalogs += 1;
                warnings.extend(entry_warnings.into_iter().map(|e| e.to_string()));
            }
            Err(e) => {
                log::warn!("catalog {} skipped: {e}", catalog_path.display());
                warnings.push(format!("catalog {} skipped: {e}", catalog_path.display()));
            }
        }
    }

    if usable_catalogs == 0 {
        log::error!("no catalog files could be parsed; aborting");
        return 3;
    }

    let cache = config.cache_path.as_ref().and_then(|path| match Cache::open(path) {
        Ok(cache) => Some(Mutex::new(cache)),
        Err(e) => {
            log::warn!("could not open cache at {}: {e}; continuing without a cache", path.display());
            None
        }
    });

    let scanner = romkeep_matcher::Scanner::new(config.scanner.clone());
    let scan_outcome = scanner.scan(&config.inputs, cache.as_ref());
    warnings.extend(scan_outcome.warnings.clone());

    let match_outcome = match_all(scan_outcome.records, &index);

    let selected = select(&match_outcome.matched, &index, &config.filters, &config.preferences, config.single_mode);

    let mut items = Vec::with_capacity(selected.len());
    for candidate in &selected {
        let entry = index.entry(candidate.romref.0);
        let ctx = token_context_for(entry, &candidate.record.record);
        let resolved = resolve_token_template(&config.output_root_template, &ctx);
        warnings.extend(resolved.warnings);

        let Some(destination) = resolved.paths.first() else {
            continue;
        };

        items.push(PlanItem {
            catalog_name: entry.catalog_name.clone(),
            entry_name: entry.game.name.clone(),
            romref: candidate.romref,
            record: candidate.record.record.clone(),
            destination: PathBuf::from(destination),
        });
    }

    let output_root = literal_output_root(&config.output_root_template);
    let existing_output_paths = if config.commands.clean {
        existing_paths_under(&output_root)
    } else {
        Vec::new()
    };

    let mut plan = build_plan(&items, &config.commands, &existing_output_paths, &config.protected_paths);

    if let Some(path) = &dir2dat_path {
        plan.actions.push(Action::EmitCatalog {
            path: path.clone(),
            kind: CatalogKind::Dir2dat,
            format: catalog_format,
        });
    }
    if let Some(path) = &fixdat_path {
        plan.actions.push(Action::EmitCatalog {
            path: path.clone(),
            kind: CatalogKind::Fixdat,
            format: catalog_format,
        });
    }

    if config.print_plan {
        match serde_json::to_string_pretty(&plan.actions) {
            Ok(text) => println!("{text}"),
            Err(e) => log::warn!("could not serialize plan for --print-plan: {e}"),
        }
    }

    if let Some(path) = &dir2dat_path {
        let doc = crate::catalog_doc::build_dir2dat(&index, &selected);
        write_catalog_doc(path, &doc, catalog_format, &mut warnings);
    }
    if let Some(path) = &fixdat_path {
        let doc = crate::catalog_doc::build_fixdat(&index, &match_outcome);
        write_catalog_doc(path, &doc, catalog_format, &mut warnings);
    }

    let enrichment_notes = run_enrichment(config, &match_outcome.unmatched, cache.as_ref());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.scanner.hash_threads.max(1))
        .build()
        .expect("building executor worker pool");
    let execution = executor::execute(&plan, &output_root, &pool);

    let action_failures: Vec<String> = execution.failures.iter().map(|e| e.to_string()).collect();
    warnings.extend(enrichment_notes);

    let summary = report::build_summary(&index, &match_outcome, &selected, &plan.conflicts, warnings, action_failures.clone());

    for path in &execution.emitted_report_paths {
        if let Ok(text) = serde_json::to_string_pretty(&summary) {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(path, text) {
                log::warn!("could not write report to {}: {e}", path.display());
            }
        }
    }

    if let Some(diag_path) = &config.diag_path {
        if let Ok(text) = serde_json::to_string_pretty(&summary) {
            if let Err(e) = std::fs::write(diag_path, text) {
                log::warn!("could not write diagnostics to {}: {e}", diag_path.display());
            }
        }
    }

    if !execution.is_success() {
        1
    } else {
        0
    }
}

/// Advisory metadata enrichment for every record that matched no catalog
/// entry (spec.md §2: "Unmatched records feed Enrichment"; §4.6: "Records
/// with zero matches go to the Enrichment queue if enabled"). Matched
/// records feed the Candidate Selector instead and never reach here.
/// Failures and cache-miss diagnostics are folded into the report's
/// warnings; they never affect the exit code (spec.md §7: `NetworkError` is
/// contained within enrichment).
fn run_enrichment(config: &RunConfig, unmatched: &[romkeep_matcher::RawRecord], cache: Option<&Mutex<Cache>>) -> Vec<String> {
    if !config.enrichment.source_h_enabled && config.enrichment.source_i_mode == romkeep_enrichment::SourceIMode::Off {
        return Vec::new();
    }

    let source_h_base = std::env::var("ROMKEEP_SOURCE_H_URL").unwrap_or_else(|_| "https://h.example.invalid".to_string());
    let source_h = if config.enrichment.source_h_enabled {
        HttpSourceHClient::new(source_h_base).ok()
    } else {
        None
    };

    let source_i: Option<HttpSourceIClient> = if config.enrichment.source_i_mode != romkeep_enrichment::SourceIMode::Off {
        match (&config.source_i_client_id, &config.source_i_token) {
            (Some(id), Some(token)) => {
                let base = std::env::var("ROMKEEP_SOURCE_I_URL").unwrap_or_else(|_| "https://i.example.invalid".to_string());
                HttpSourceIClient::new(base, id.clone(), token.clone()).ok()
            }
            _ => None,
        }
    } else {
        None
    };

    let source_h_trait: Option<&dyn romkeep_enrichment::ChecksumMetadataClient> =
        source_h.as_ref().map(|c| c as &dyn romkeep_enrichment::ChecksumMetadataClient);
    let source_i_trait: Option<&dyn NameMetadataClient> = source_i.as_ref().map(|c| c as &dyn NameMetadataClient);

    let mut notes = Vec::new();
    for record in unmatched {
        let checksum_query = ChecksumQuery {
            sha1: record.digest.sha1_hex(),
            md5: record.digest.md5_hex(),
            sha256: record.digest.sha256_hex(),
        };
        let name_query = NameQuery {
            title: record.match_name(),
            platform_slug: None,
        };

        let outcome = enrich(
            Some(&checksum_query),
            Some(&name_query),
            &config.enrichment,
            cache,
            0,
            source_h_trait,
            source_i_trait,
        );

        if let Some(diagnostic) = outcome.diagnostic {
            notes.push(format!("enrichment for {}: {}", record.display_path(), diagnostic));
        }
    }
    notes
}
