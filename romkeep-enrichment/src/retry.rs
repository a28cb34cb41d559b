// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Exponential backoff with jitter, capped, for transient network failures
(spec.md §4.11: "retry with exponential backoff up to a configurable cap"). */

use {rand::Rng, std::time::Duration};

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_millis(200),
            cap: Duration::from_secs(5),
        }
    }
}

fn backoff_for_attempt(config: &BackoffConfig, attempt_no: u32) -> Duration {
    let exp = config.base.saturating_mul(1u32 << attempt_no.min(16));
    let capped = exp.min(config.cap);
    let jitter_ceiling_ms = (capped.as_millis() as u64 / 4).max(1);
    let jitter = rand::thread_rng().gen_range(0..=jitter_ceiling_ms);
    capped + Duration::from_millis(jitter)
}

/// Run `attempt` up to `config.max_attempts` times, sleeping with
/// exponentially-growing jittered backoff between failures. Returns the
/// first success, or the last error once attempts are exhausted.
pub fn with_backoff<T, E, F>(config: &BackoffConfig, mut attempt: F) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut last_err = None;

    for attempt_no in 0..config.max_attempts.max(1) {
        match attempt(attempt_no) {
            Ok(value) => return Ok(value),
            Err(err) => {
                log::warn!("enrichment request attempt {attempt_no} failed: {err}");
                last_err = Some(err);
                if attempt_no + 1 < config.max_attempts {
                    std::thread::sleep(backoff_for_attempt(config, attempt_no));
                }
            }
        }
    }

    Err(last_err.expect("at least one attempt always runs"))
}
