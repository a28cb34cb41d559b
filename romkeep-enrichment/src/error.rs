// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Error type for this crate. Per spec.md §4.11 and §7, every one of these
/// is caught, logged, and treated as "no enrichment for this record" by the
/// orchestrator in [`crate::enrich`] — callers should not need to match on
/// variants except for tests asserting a specific failure shape.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("network error querying {0}: {1}")]
    Network(String, reqwest::Error),

    #[error("unexpected response status {1} from {0}")]
    BadStatus(String, reqwest::StatusCode),

    #[error("could not parse response body from {0}: {1}")]
    Parse(String, serde_json::Error),

    #[error("cache error: {0}")]
    Cache(#[from] romkeep_cache::CacheError),
}

pub type Result<T> = std::result::Result<T, EnrichmentError>;
