// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Logging setup (SPEC_FULL.md §10.1). Library crates only log through the
`log` facade; this binary is the one place a concrete logger gets installed,
via `env_logger`.

Verbosity 0 maps to `warn`, 1 to `info`, 2 to `debug`, 3 to `trace`.
`--quiet` forces logging off outright. `RUST_LOG` still wins over the
verbosity flag if set, so a developer chasing one module can narrow the
filter without recompiling.
*/

use env_logger::{Builder, Env};

/// Install the global logger. `verbosity` is the repeated `-v` count (0-3,
/// already clamped by the CLI); `quiet` forces `off` regardless of it.
pub fn init(verbosity: u8, quiet: bool) {
    let default_level = if quiet {
        "off"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    Builder::from_env(Env::default().default_filter_or(default_level)).init();
}
