// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Persistence for Source I credentials (SPEC_FULL.md §10.3).

`--I-client-id`/`--I-token` can be passed on every invocation, but spec.md
§6 also allows them to be remembered between runs. They're written to a
per-user TOML file under the OS config directory (via the `dirs` crate,
same as the teacher's `environment.rs` used for locating build state), with
the same lock-then-atomic-rename sequence `romkeep_common::http::download_to_path`
uses for downloaded content, so two `romkeep` invocations sharing a home
directory don't tear each other's writes.
*/

use {
    fs2::FileExt,
    serde::{Deserialize, Serialize},
    std::path::PathBuf,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("could not determine a per-user config directory")]
    NoConfigDir,

    #[error("io error at {0}: {1}")]
    Io(String, std::io::Error),

    #[error("could not parse credentials file {0}: {1}")]
    Parse(String, toml::de::Error),

    #[error("could not serialize credentials: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, CredentialsError>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    source_i_client_id: Option<String>,
    source_i_token: Option<String>,
}

fn credentials_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or(CredentialsError::NoConfigDir)?.join("romkeep");
    Ok(dir.join("credentials.toml"))
}

/// Load previously-saved Source I credentials, if any. Missing file is not
/// an error: it just means nothing has been saved yet.
pub fn load_source_i() -> Result<Option<(String, String)>> {
    let path = credentials_path()?;
    if !path.exists() {
        return Ok(None);
    }

    let text = std::fs::read_to_string(&path).map_err(|e| CredentialsError::Io(path.display().to_string(), e))?;
    let stored: StoredCredentials =
        toml::from_str(&text).map_err(|e| CredentialsError::Parse(path.display().to_string(), e))?;

    match (stored.source_i_client_id, stored.source_i_token) {
        (Some(id), Some(token)) => Ok(Some((id, token))),
        _ => Ok(None),
    }
}

/// Save Source I credentials atomically: write to a sibling `.tmp` path,
/// then rename over the real destination, under an exclusive lock on a
/// sibling `.lock` file so concurrent invocations don't interleave writes.
pub fn save_source_i(client_id: &str, token: &str) -> Result<()> {
    let path = credentials_path()?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| CredentialsError::Io(dir.display().to_string(), e))?;
    }

    let lock_path = path.with_extension("lock");
    let lock = std::fs::File::create(&lock_path).map_err(|e| CredentialsError::Io(lock_path.display().to_string(), e))?;
    lock.lock_exclusive().map_err(|e| CredentialsError::Io(lock_path.display().to_string(), e))?;

    let stored = StoredCredentials {
        source_i_client_id: Some(client_id.to_string()),
        source_i_token: Some(token.to_string()),
    };
    let text = toml::to_string_pretty(&stored)?;

    let temp_path = path.with_file_name("credentials.toml.tmp");
    std::fs::write(&temp_path, text).map_err(|e| CredentialsError::Io(temp_path.display().to_string(), e))?;
    std::fs::rename(&temp_path, &path).map_err(|e| CredentialsError::Io(path.display().to_string(), e))?;

    let _ = lock.unlock();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_credentials_roundtrip_via_toml() {
        let stored = StoredCredentials {
            source_i_client_id: Some("client".to_string()),
            source_i_token: Some("token".to_string()),
        };
        let text = toml::to_string_pretty(&stored).unwrap();
        let parsed: StoredCredentials = toml::from_str(&text).unwrap();
        assert_eq!(parsed.source_i_client_id.as_deref(), Some("client"));
        assert_eq!(parsed.source_i_token.as_deref(), Some("token"));
    }
}
