// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Error type for this crate.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("digest read failed: {0:?}")]
    DigestFailed(#[from] std::io::Error),

    #[error("invalid hex in header table: {0}")]
    BadHex(#[from] hex::FromHexError),

    #[error("header table parse error: {0:?}")]
    HeaderTableParse(#[from] toml::de::Error),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, DigestError>;
