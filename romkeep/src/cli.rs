// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Command-line surface (spec.md §6), built with `clap`'s 4.x `Command`
builder API.

`run_cli` parses `std::env::args`, resolves globs, loads or persists Source
I credentials, builds a [`RunConfig`], and hands off to
[`crate::run::run`]. It returns the process exit code directly rather than
a `Result`, since spec.md §6 defines specific codes for config errors (2)
and catalog exhaustion (3) that aren't simply "parsing failed".
*/

use {
    crate::config::{ConfigError, RawOptions, RunConfig},
    crate::credentials,
    clap::{Arg, ArgAction, Command},
    romkeep_enrichment::SourceIMode,
    romkeep_matcher::LinkMode,
    std::path::PathBuf,
};

fn expand_globs(patterns: &[String], kind: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let literal = PathBuf::from(pattern);
        if literal.exists() {
            paths.push(literal);
            continue;
        }
        let mut matched_any = false;
        for entry in glob::glob(pattern).map_err(|e| anyhow::anyhow!("invalid {kind} glob {pattern:?}: {e}"))? {
            paths.push(entry.map_err(|e| anyhow::anyhow!("error resolving {kind} glob {pattern:?}: {e}"))?);
            matched_any = true;
        }
        if !matched_any {
            log::warn!("{kind} pattern matched nothing: {pattern}");
        }
    }
    Ok(paths)
}

fn command() -> Command {
    Command::new("romkeep")
        .about("Scan, match, and organize ROM collections against DAT catalogs")
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .value_name("PATH")
                .help("An input path or glob to scan; may be repeated")
                .action(ArgAction::Append)
                .required(true),
        )
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .short('c')
                .value_name("PATH")
                .help("A DAT catalog file or glob; may be repeated")
                .action(ArgAction::Append)
                .required(true),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("TEMPLATE")
                .help("Output root template, may contain {region}/{datName}/etc tokens")
                .required(true),
        )
        .arg(Arg::new("copy").long("copy").action(ArgAction::SetTrue))
        .arg(Arg::new("move").long("move").action(ArgAction::SetTrue))
        .arg(
            Arg::new("link")
                .long("link")
                .value_name("MODE")
                .value_parser(["hard", "symbolic", "reflink"]),
        )
        .arg(Arg::new("extract").long("extract").action(ArgAction::SetTrue))
        .arg(Arg::new("zip").long("zip").action(ArgAction::SetTrue))
        .arg(Arg::new("playlist").long("playlist").action(ArgAction::SetTrue))
        .arg(Arg::new("test").long("test").action(ArgAction::SetTrue))
        .arg(Arg::new("clean").long("clean").action(ArgAction::SetTrue))
        .arg(Arg::new("report").long("report").action(ArgAction::SetTrue))
        .arg(Arg::new("dir2dat").long("dir2dat").value_name("PATH"))
        .arg(Arg::new("fixdat").long("fixdat").value_name("PATH"))
        .arg(
            Arg::new("format")
                .long("format")
                .value_name("FORMAT")
                .help("Wire format for --dir2dat/--fixdat output; the plan and report are always JSON")
                .value_parser(["json", "xml"])
                .default_value("json"),
        )
        .arg(
            Arg::new("single")
                .long("single")
                .help("1G1R mode: at most one candidate per title")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("region")
                .long("region")
                .value_name("REGION")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("language")
                .long("language")
                .value_name("LANG")
                .action(ArgAction::Append),
        )
        .arg(Arg::new("prefer-retail").long("prefer-retail").action(ArgAction::SetTrue))
        .arg(Arg::new("prefer-verified").long("prefer-verified").action(ArgAction::SetTrue))
        .arg(
            Arg::new("prefer-revision")
                .long("prefer-revision")
                .value_name("WHICH")
                .value_parser(["newest", "oldest"])
                .default_value("newest"),
        )
        .arg(Arg::new("include").long("include").value_name("REGEX"))
        .arg(Arg::new("exclude").long("exclude").value_name("REGEX"))
        .arg(Arg::new("bios-only").long("bios-only").action(ArgAction::SetTrue))
        .arg(Arg::new("device-only").long("device-only").action(ArgAction::SetTrue))
        .arg(Arg::new("allow-unlicensed").long("allow-unlicensed").action(ArgAction::SetTrue))
        .arg(Arg::new("allow-bad-dump").long("allow-bad-dump").action(ArgAction::SetTrue))
        .arg(
            Arg::new("hash-threads")
                .long("hash-threads")
                .value_name("N")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("scan-threads")
                .long("scan-threads")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .default_value("1"),
        )
        .arg(Arg::new("header-table").long("header-table").value_name("PATH"))
        .arg(Arg::new("cache-db").long("cache-db").value_name("PATH"))
        .arg(Arg::new("cache-only").long("cache-only").action(ArgAction::SetTrue))
        .arg(Arg::new("enable-h").long("enable-H").action(ArgAction::SetTrue))
        .arg(Arg::new("i-client-id").long("I-client-id").value_name("ID"))
        .arg(Arg::new("i-token").long("I-token").value_name("TOKEN"))
        .arg(
            Arg::new("i-mode")
                .long("I-mode")
                .value_name("MODE")
                .value_parser(["best-effort", "always", "off"])
                .default_value("off"),
        )
        .arg(Arg::new("remember-credentials").long("remember-credentials").action(ArgAction::SetTrue))
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Increase verbosity; may be repeated up to 3 times")
                .action(ArgAction::Count),
        )
        .arg(Arg::new("quiet").long("quiet").short('q').action(ArgAction::SetTrue))
        .arg(Arg::new("print-plan").long("print-plan").action(ArgAction::SetTrue))
        .arg(Arg::new("diag").long("diag").value_name("PATH"))
        .arg(
            Arg::new("protect")
                .long("protect")
                .value_name("PATH")
                .help("A path under the output root to never touch with --clean")
                .action(ArgAction::Append),
        )
}

fn link_mode_of(value: Option<&str>) -> Option<LinkMode> {
    match value {
        Some("hard") => Some(LinkMode::Hard),
        Some("symbolic") => Some(LinkMode::Symbolic),
        Some("reflink") => Some(LinkMode::ReflinkIfSupported),
        _ => None,
    }
}

fn source_i_mode_of(value: &str) -> SourceIMode {
    match value {
        "always" => SourceIMode::Always,
        "best-effort" => SourceIMode::BestEffort,
        _ => SourceIMode::Off,
    }
}

/// Parse arguments, assemble a [`RunConfig`], and run the pipeline,
/// returning the process exit code (spec.md §6: 0 success, 1 an action
/// failed, 2 config error, 3 no catalogs usable).
pub fn run_cli() -> i32 {
    let matches = command().get_matches();

    let verbosity = (*matches.get_one::<u8>("verbose").unwrap_or(&0)).min(3);
    let quiet = matches.get_flag("quiet");
    crate::logging::init(verbosity, quiet);

    let inputs = matches.get_many::<String>("input").map(|v| v.cloned().collect::<Vec<_>>()).unwrap_or_default();
    let catalogs = matches.get_many::<String>("catalog").map(|v| v.cloned().collect::<Vec<_>>()).unwrap_or_default();

    let resolved_inputs = match expand_globs(&inputs, "input") {
        Ok(paths) => paths,
        Err(e) => {
            log::error!("{e}");
            return 2;
        }
    };
    let resolved_catalogs = match expand_globs(&catalogs, "catalog") {
        Ok(paths) => paths,
        Err(e) => {
            log::error!("{e}");
            return 2;
        }
    };

    let mut source_i_client_id = matches.get_one::<String>("i-client-id").cloned();
    let mut source_i_token = matches.get_one::<String>("i-token").cloned();
    if source_i_client_id.is_none() || source_i_token.is_none() {
        if let Ok(Some((id, token))) = credentials::load_source_i() {
            source_i_client_id = source_i_client_id.or(Some(id));
            source_i_token = source_i_token.or(Some(token));
        }
    }
    if matches.get_flag("remember-credentials") {
        if let (Some(id), Some(token)) = (&source_i_client_id, &source_i_token) {
            if let Err(e) = credentials::save_source_i(id, token) {
                log::warn!("could not persist Source I credentials: {e}");
            }
        }
    }

    let raw = RawOptions {
        inputs: resolved_inputs,
        catalogs: resolved_catalogs,
        output_root_template: matches.get_one::<String>("output").cloned().unwrap_or_default(),

        copy: matches.get_flag("copy"),
        move_files: matches.get_flag("move"),
        link_mode: link_mode_of(matches.get_one::<String>("link").map(|s| s.as_str())),
        extract: matches.get_flag("extract"),
        zip: matches.get_flag("zip"),
        playlist: matches.get_flag("playlist"),
        test: matches.get_flag("test"),
        clean: matches.get_flag("clean"),
        report: matches.get_flag("report"),

        single_mode: matches.get_flag("single"),
        regions: matches.get_many::<String>("region").map(|v| v.cloned().collect()).unwrap_or_default(),
        languages: matches.get_many::<String>("language").map(|v| v.cloned().collect()).unwrap_or_default(),
        only_retail: matches.get_flag("prefer-retail"),
        prefer_verified: matches.get_flag("prefer-verified"),
        prefer_oldest: matches.get_one::<String>("prefer-revision").map(|s| s.as_str()) == Some("oldest"),

        include_regex: matches.get_one::<String>("include").cloned(),
        exclude_regex: matches.get_one::<String>("exclude").cloned(),
        bios_only: matches.get_flag("bios-only"),
        device_only: matches.get_flag("device-only"),
        allow_unlicensed: matches.get_flag("allow-unlicensed"),
        allow_bad_dump: matches.get_flag("allow-bad-dump"),

        hash_threads: matches.get_one::<usize>("hash-threads").copied().unwrap_or(0),
        scan_threads: matches.get_one::<usize>("scan-threads").copied().unwrap_or(1),
        header_table_path: matches.get_one::<String>("header-table").map(PathBuf::from),

        cache_path: matches.get_one::<String>("cache-db").map(PathBuf::from),
        cache_only: matches.get_flag("cache-only"),

        enable_source_h: matches.get_flag("enable-h"),
        source_i_client_id,
        source_i_token,
        source_i_mode: source_i_mode_of(matches.get_one::<String>("i-mode").map(|s| s.as_str()).unwrap_or("off")),

        print_plan: matches.get_flag("print-plan"),
        diag_path: matches.get_one::<String>("diag").map(PathBuf::from),
        protected_paths: matches.get_many::<String>("protect").map(|v| v.map(PathBuf::from).collect()).unwrap_or_default(),

        verbosity,
        quiet,
    };

    let dir2dat_path = matches.get_one::<String>("dir2dat").cloned();
    let fixdat_path = matches.get_one::<String>("fixdat").cloned();
    let catalog_format = match matches.get_one::<String>("format").map(|s| s.as_str()) {
        Some("xml") => romkeep_matcher::ReportFormat::Xml,
        _ => romkeep_matcher::ReportFormat::Json,
    };

    let config: RunConfig = match raw.build() {
        Ok(config) => config,
        Err(e) => {
            log_config_error(&e);
            return 2;
        }
    };

    crate::run::run(&config, dir2dat_path, fixdat_path, catalog_format)
}

fn log_config_error(e: &ConfigError) {
    log::error!("configuration error: {e}");
}
