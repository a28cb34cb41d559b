// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Shared low-level helpers used by several `romkeep` crates.

This crate has no knowledge of ROMs, catalogs, or plans. It exists so the
HTTP client construction (proxy-aware) and the download-and-verify-by-hash
dance are implemented exactly once instead of once per crate that happens
to need to fetch something.
*/

pub mod http;
pub mod testutil;

pub use crate::http::{download_and_verify, download_to_path, get_http_client, RemoteContent};
