// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Error type for this crate. Corresponds to spec.md §7's `CatalogParseError`
/// kind; the caller decides whether a parse failure should skip just this
/// catalog (the common case) or abort the run (if no catalogs remain usable).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("XML error parsing catalog: {0:?}")]
    Xml(#[from] serde_xml_rs::Error),

    #[error("JSON error parsing catalog: {0:?}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hex in ROM digest {0:?} of game {1:?}: {2:?}")]
    BadDigestHex(String, String, hex::FromHexError),

    #[error("digest of unexpected length for ROM {0:?}: expected {1} bytes")]
    BadDigestLength(String, usize),

    #[error("catalog I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("unrecognized catalog format for {0}")]
    UnknownFormat(String),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, CatalogError>;
