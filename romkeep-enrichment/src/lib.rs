// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Optional, advisory metadata enrichment against two external services
(spec.md §4.11). Results attach to records but never influence matching.

[`enrich`] is the single entry point: it checks the [`romkeep_cache::Cache`]
first, respects `cache_only`, and falls back to whichever client was
injected. Tests substitute [`client::FakeMetadataClient`] for the HTTP
clients to assert `cache-only` makes zero calls (spec.md §8).
*/

pub mod client;
pub mod error;
pub mod query;
pub mod retry;

pub use crate::{
    client::{ChecksumMetadataClient, FakeMetadataClient, HttpSourceHClient, HttpSourceIClient, NameMetadataClient},
    error::{EnrichmentError, Result},
    query::{retry_ladder, ChecksumQuery, MetadataPayload, NameQuery},
};

use {romkeep_cache::Cache, std::sync::Mutex};

/// Source I's activation mode (spec.md §6's `--I-mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceIMode {
    BestEffort,
    Always,
    Off,
}

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    pub cache_only: bool,
    pub source_h_enabled: bool,
    pub source_i_mode: SourceIMode,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            cache_only: false,
            source_h_enabled: false,
            source_i_mode: SourceIMode::Off,
        }
    }
}

/// The result of attempting enrichment for one record.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentOutcome {
    pub payload: Option<MetadataPayload>,
    pub source: Option<&'static str>,
    /// A non-fatal diagnostic, e.g. `"CACHE-MISS (cache-only)"` or a
    /// stringified network failure. Never indicates the run should abort.
    pub diagnostic: Option<String>,
}

fn strongest_digest_hex(checksum_query: Option<&ChecksumQuery>) -> Option<String> {
    checksum_query.and_then(|q| q.strongest()).map(|(_, hex)| hex.to_string())
}

fn cached_or_fetch(
    source_label: &'static str,
    digest_hex: Option<&str>,
    cache: Option<&Mutex<Cache>>,
    cache_only: bool,
    now_unix: i64,
    fetch: impl FnOnce() -> Result<Option<MetadataPayload>>,
) -> (Option<MetadataPayload>, Option<String>) {
    if let (Some(cache), Some(digest_hex)) = (cache, digest_hex) {
        if let Ok(locked) = cache.lock() {
            if let Ok(Some(cached)) = locked.get_enrichment(source_label, digest_hex) {
                if let Ok(payload) = serde_json::from_str::<MetadataPayload>(&cached.payload_json) {
                    return (Some(payload), None);
                }
            }
        }
    }

    if cache_only {
        return (None, Some("CACHE-MISS (cache-only)".to_string()));
    }

    match fetch() {
        Ok(Some(payload)) => {
            if let (Some(cache), Some(digest_hex)) = (cache, digest_hex) {
                if let Ok(locked) = cache.lock() {
                    if let Ok(json) = serde_json::to_string(&payload) {
                        let _ = locked.put_enrichment(source_label, digest_hex, &json, now_unix);
                    }
                }
            }
            (Some(payload), None)
        }
        Ok(None) => (None, None),
        Err(e) => {
            log::warn!("enrichment lookup via {source_label} failed: {e}");
            (None, Some(e.to_string()))
        }
    }
}

/// Attempt enrichment for one record: Source H first (checksum-based),
/// falling back to Source I (name-based) only if H yielded nothing and
/// `source_i_mode` isn't `Off`. The cache is consulted (and populated)
/// under the record's own digest regardless of which source answered,
/// since the payload describes the file, not the lookup method.
pub fn enrich(
    checksum_query: Option<&ChecksumQuery>,
    name_query: Option<&NameQuery>,
    config: &EnrichmentConfig,
    cache: Option<&Mutex<Cache>>,
    now_unix: i64,
    source_h: Option<&dyn ChecksumMetadataClient>,
    source_i: Option<&dyn NameMetadataClient>,
) -> EnrichmentOutcome {
    let digest_hex = strongest_digest_hex(checksum_query);
    let mut diagnostic = None;

    if config.source_h_enabled {
        if let Some(query) = checksum_query {
            let (payload, d) = cached_or_fetch("H", digest_hex.as_deref(), cache, config.cache_only, now_unix, || {
                source_h.map(|c| c.lookup_by_checksum(query)).unwrap_or(Ok(None))
            });
            diagnostic = diagnostic.or(d);
            if payload.is_some() {
                return EnrichmentOutcome { payload, source: Some("H"), diagnostic };
            }
        }
    }

    if config.source_i_mode != SourceIMode::Off {
        if let Some(query) = name_query {
            let (payload, d) = cached_or_fetch("I", digest_hex.as_deref(), cache, config.cache_only, now_unix, || {
                source_i.map(|c| c.lookup_by_name(query)).unwrap_or(Ok(None))
            });
            diagnostic = diagnostic.or(d);
            if payload.is_some() {
                return EnrichmentOutcome { payload, source: Some("I"), diagnostic };
            }
        }
    }

    EnrichmentOutcome {
        payload: None,
        source: None,
        diagnostic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> MetadataPayload {
        MetadataPayload {
            title: Some("Game".to_string()),
            description: None,
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn cache_only_emits_diagnostic_and_makes_no_network_call() {
        let fake_h = FakeMetadataClient {
            checksum_response: Some(sample_payload()),
            ..FakeMetadataClient::default()
        };
        let config = EnrichmentConfig {
            cache_only: true,
            source_h_enabled: true,
            source_i_mode: SourceIMode::Off,
        };
        let query = ChecksumQuery {
            sha1: Some("abc".to_string()),
            ..ChecksumQuery::default()
        };

        let outcome = enrich(Some(&query), None, &config, None, 0, Some(&fake_h), None);

        assert!(outcome.payload.is_none());
        assert_eq!(outcome.diagnostic.as_deref(), Some("CACHE-MISS (cache-only)"));
        assert_eq!(fake_h.call_count(), 0);
    }

    #[test]
    fn cache_hit_avoids_network_call() {
        let cache = Mutex::new(Cache::open_in_memory().unwrap());
        let digest_hex = "abc".to_string();
        {
            let locked = cache.lock().unwrap();
            let payload = serde_json::to_string(&sample_payload()).unwrap();
            locked.put_enrichment("H", &digest_hex, &payload, 0).unwrap();
        }

        let fake_h = FakeMetadataClient::default();
        let config = EnrichmentConfig {
            cache_only: false,
            source_h_enabled: true,
            source_i_mode: SourceIMode::Off,
        };
        let query = ChecksumQuery {
            sha1: Some(digest_hex),
            ..ChecksumQuery::default()
        };

        let outcome = enrich(Some(&query), None, &config, Some(&cache), 0, Some(&fake_h), None);

        assert_eq!(outcome.payload, Some(sample_payload()));
        assert_eq!(fake_h.call_count(), 0);
    }

    #[test]
    fn falls_back_to_source_i_when_h_yields_nothing() {
        let fake_h = FakeMetadataClient::default();
        let fake_i = FakeMetadataClient {
            name_response: Some(sample_payload()),
            ..FakeMetadataClient::default()
        };
        let config = EnrichmentConfig {
            cache_only: false,
            source_h_enabled: true,
            source_i_mode: SourceIMode::BestEffort,
        };
        let checksum_query = ChecksumQuery {
            sha1: Some("abc".to_string()),
            ..ChecksumQuery::default()
        };
        let name_query = NameQuery {
            title: "Game".to_string(),
            platform_slug: None,
        };

        let outcome = enrich(
            Some(&checksum_query),
            Some(&name_query),
            &config,
            None,
            0,
            Some(&fake_h),
            Some(&fake_i),
        );

        assert_eq!(outcome.source, Some("I"));
        assert_eq!(fake_h.call_count(), 1);
        assert_eq!(fake_i.call_count(), 1);
    }

    #[test]
    fn source_i_off_is_never_consulted() {
        let fake_i = FakeMetadataClient {
            name_response: Some(sample_payload()),
            ..FakeMetadataClient::default()
        };
        let config = EnrichmentConfig {
            cache_only: false,
            source_h_enabled: false,
            source_i_mode: SourceIMode::Off,
        };
        let name_query = NameQuery {
            title: "Game".to_string(),
            platform_slug: None,
        };

        let outcome = enrich(None, Some(&name_query), &config, None, 0, None, Some(&fake_i));

        assert!(outcome.payload.is_none());
        assert_eq!(fake_i.call_count(), 0);
    }
}
