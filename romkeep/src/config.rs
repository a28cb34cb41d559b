// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The resolved, validated run configuration (SPEC_FULL.md §10.3).

[`RunConfig`] is built once in [`crate::cli::run_cli`] from the parsed CLI
arguments (and, for enrichment credentials, the per-user credentials file)
and handed to every downstream component by reference. It is never mutated
afterward, mirroring the Catalog Index's read-only-after-construction
invariant.
*/

use {
    romkeep_catalog::{PreferenceVector, RevisionOrder},
    romkeep_digest::{HeaderTable, Want},
    romkeep_enrichment::{EnrichmentConfig, SourceIMode},
    romkeep_matcher::{CommandSet, FilterSet, LinkMode, ReportFormat, ScannerConfig},
    std::path::PathBuf,
    thiserror::Error,
};

/// Fatal, pre-scan configuration problems (spec.md §7's `ConfigError` kind).
/// Any of these map to exit code 2 and abort before scanning starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no input paths given")]
    NoInputs,

    #[error("no catalog files given")]
    NoCatalogs,

    #[error("no commands requested; pass at least one of copy/move/link/extract/zip/playlist/test/dir2dat/fixdat/clean/report")]
    NoCommands,

    #[error("invalid include filter regex: {0}")]
    BadIncludeRegex(regex::Error),

    #[error("invalid exclude filter regex: {0}")]
    BadExcludeRegex(regex::Error),

    #[error("output root template is empty")]
    EmptyOutputRoot,

    #[error("could not read header table file {0}: {1}")]
    HeaderTableIo(String, std::io::Error),

    #[error("could not parse header table from {0}: {1}")]
    HeaderTableParse(String, romkeep_digest::DigestError),

    #[error("enrichment source I was requested but no client id/token is configured")]
    MissingSourceICredentials,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// The fully resolved configuration for one run, assembled once and shared
/// by reference with every component of the pipeline.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub inputs: Vec<PathBuf>,
    pub catalogs: Vec<PathBuf>,
    pub output_root_template: String,

    pub commands: CommandSet,
    pub single_mode: bool,

    pub filters: FilterSet,
    pub preferences: PreferenceVector,

    pub scanner: ScannerConfig,

    pub cache_path: Option<PathBuf>,
    pub cache_only: bool,

    pub enrichment: EnrichmentConfig,
    pub source_i_client_id: Option<String>,
    pub source_i_token: Option<String>,

    pub print_plan: bool,
    pub diag_path: Option<PathBuf>,

    pub protected_paths: Vec<PathBuf>,

    pub verbosity: u8,
    pub quiet: bool,
}

/// Raw option bag matching spec.md §6 one field at a time; [`RunConfig::build`]
/// validates and assembles it. Kept separate from `RunConfig` so the CLI
/// layer (`clap` matches) and the validated configuration layer don't share
/// one ad-hoc struct with optional fields everywhere.
#[derive(Debug, Default)]
pub struct RawOptions {
    pub inputs: Vec<PathBuf>,
    pub catalogs: Vec<PathBuf>,
    pub output_root_template: String,

    pub copy: bool,
    pub move_files: bool,
    pub link_mode: Option<LinkMode>,
    pub extract: bool,
    pub zip: bool,
    pub playlist: bool,
    pub test: bool,
    pub clean: bool,
    pub report: bool,

    pub single_mode: bool,
    pub regions: Vec<String>,
    pub languages: Vec<String>,
    pub only_retail: bool,
    pub prefer_verified: bool,
    pub prefer_oldest: bool,

    pub include_regex: Option<String>,
    pub exclude_regex: Option<String>,
    pub bios_only: bool,
    pub device_only: bool,
    pub allow_unlicensed: bool,
    pub allow_bad_dump: bool,

    pub hash_threads: usize,
    pub scan_threads: usize,
    pub header_table_path: Option<PathBuf>,

    pub cache_path: Option<PathBuf>,
    pub cache_only: bool,

    pub enable_source_h: bool,
    pub source_i_client_id: Option<String>,
    pub source_i_token: Option<String>,
    pub source_i_mode: SourceIMode,

    pub print_plan: bool,
    pub diag_path: Option<PathBuf>,
    pub protected_paths: Vec<PathBuf>,

    pub verbosity: u8,
    pub quiet: bool,
}

impl RawOptions {
    pub fn build(self) -> Result<RunConfig> {
        if self.inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }
        if self.catalogs.is_empty() {
            return Err(ConfigError::NoCatalogs);
        }
        if self.output_root_template.trim().is_empty() {
            return Err(ConfigError::EmptyOutputRoot);
        }

        let commands = CommandSet {
            copy: self.copy,
            move_files: self.move_files,
            link: self.link_mode,
            extract: self.extract,
            zip: self.zip,
            playlist: self.playlist,
            test: self.test,
            clean: self.clean,
            report: self.report.then_some(ReportFormat::Json),
        };

        let any_command = commands.copy
            || commands.move_files
            || commands.link.is_some()
            || commands.extract
            || commands.zip
            || commands.playlist
            || commands.test
            || commands.clean
            || commands.report.is_some();
        if !any_command {
            return Err(ConfigError::NoCommands);
        }

        let include_regex = self
            .include_regex
            .as_deref()
            .map(regex::Regex::new)
            .transpose()
            .map_err(ConfigError::BadIncludeRegex)?;
        let exclude_regex = self
            .exclude_regex
            .as_deref()
            .map(regex::Regex::new)
            .transpose()
            .map_err(ConfigError::BadExcludeRegex)?;

        let filters = FilterSet {
            include_regex,
            exclude_regex,
            bios_only: self.bios_only,
            device_only: self.device_only,
            allow_unlicensed: self.allow_unlicensed,
            allow_bad_dump: self.allow_bad_dump,
        };

        let preferences = PreferenceVector {
            regions: self.regions,
            languages: self.languages,
            only_retail: self.only_retail,
            prefer_verified: self.prefer_verified,
            revision_order: if self.prefer_oldest {
                RevisionOrder::PreferOldest
            } else {
                RevisionOrder::PreferNewest
            },
        };

        let header_table = match &self.header_table_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::HeaderTableIo(path.display().to_string(), e))?;
                HeaderTable::parse(&text)
                    .map_err(|e| ConfigError::HeaderTableParse(path.display().to_string(), e))?
            }
            None => HeaderTable::builtin(),
        };

        let default_parallelism = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let scanner = ScannerConfig {
            scan_threads: if self.scan_threads == 0 { 1 } else { self.scan_threads },
            hash_threads: if self.hash_threads == 0 {
                default_parallelism
            } else {
                self.hash_threads
            },
            header_table,
            want: Want::all(),
        };

        let enrichment = EnrichmentConfig {
            cache_only: self.cache_only,
            source_h_enabled: self.enable_source_h,
            source_i_mode: self.source_i_mode,
        };

        if enrichment.source_i_mode != SourceIMode::Off
            && (self.source_i_client_id.is_none() || self.source_i_token.is_none())
        {
            return Err(ConfigError::MissingSourceICredentials);
        }

        Ok(RunConfig {
            inputs: self.inputs,
            catalogs: self.catalogs,
            output_root_template: self.output_root_template,
            commands,
            single_mode: self.single_mode,
            filters,
            preferences,
            scanner,
            cache_path: self.cache_path,
            cache_only: self.cache_only,
            enrichment,
            source_i_client_id: self.source_i_client_id,
            source_i_token: self.source_i_token,
            print_plan: self.print_plan,
            diag_path: self.diag_path,
            protected_paths: self.protected_paths,
            verbosity: self.verbosity,
            quiet: self.quiet,
        })
    }
}
