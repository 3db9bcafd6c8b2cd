//! The server's bearer-token store: a small YAML file loaded once at
//! startup, appended to by `gentoken`. A typed `serde` config struct
//! scaled down to the single list this protocol needs -- no layered
//! config-loading crate is warranted for one list of tokens.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum ConfigErr {
    #[error("failed to read token config at {path:?}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse token config at {path:?}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },

    #[error("failed to write token config at {path:?}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(default)]
    tokens: Vec<TokenEntry>,
}

/// The loaded token list, held for the life of the `receive` process.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: Vec<TokenEntry>,
}

impl TokenStore {
    /// Builds a store directly from already-generated tokens, bypassing
    /// the YAML file -- useful for embedding a server in a test harness.
    pub fn from_raw_tokens(tokens: impl IntoIterator<Item = String>) -> Self {
        let tokens = tokens
            .into_iter()
            .map(|token| TokenEntry { token, created: now() })
            .collect();
        Self { tokens }
    }

    /// Loads `path`, or starts empty if the file does not exist yet
    /// (the first `gentoken` run creates it).
    pub fn load(path: &Path) -> Result<Self, ConfigErr> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigErr::Read { path: path.to_path_buf(), source })?;
        let file: TokenFile = serde_yaml::from_str(&content)
            .map_err(|source| ConfigErr::Parse { path: path.to_path_buf(), source })?;
        Ok(Self { tokens: file.tokens })
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.tokens.iter().any(|entry| crate::api::auth::token_matches(candidate, &entry.token))
    }

    /// Appends a freshly generated token to `path`, creating it with
    /// mode 0600 if it doesn't exist, and returns the new token.
    pub fn gentoken(path: &Path) -> Result<String, ConfigErr> {
        let mut store = Self::load(path)?;
        let mut raw = [0u8; 64];
        rand::RngCore::fill_bytes(&mut rand::rng(), &mut raw);
        let token = BASE64_STANDARD.encode(raw);
        store.tokens.push(TokenEntry { token: token.clone(), created: now() });
        store.save(path)?;
        Ok(token)
    }

    fn save(&self, path: &Path) -> Result<(), ConfigErr> {
        let file = TokenFile { tokens: self.tokens.clone() };
        let yaml = serde_yaml::to_string(&file)
            .map_err(|source| ConfigErr::Parse { path: path.to_path_buf(), source })?;

        let mut handle = open_with_mode(path)
            .map_err(|source| ConfigErr::Write { path: path.to_path_buf(), source })?;
        handle
            .write_all(yaml.as_bytes())
            .map_err(|source| ConfigErr::Write { path: path.to_path_buf(), source })?;
        Ok(())
    }
}

#[cfg(unix)]
fn open_with_mode(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_with_mode(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

fn now() -> OffsetDateTime {
    // OffsetDateTime::now_utc is the one non-deterministic primitive in
    // this module; isolated here so tests can construct fixed entries
    // directly instead of depending on wall-clock time.
    OffsetDateTime::now_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gentoken_then_load_reads_back_same_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.yaml");

        let token = TokenStore::gentoken(&path).unwrap();
        let store = TokenStore::load(&path).unwrap();
        assert!(store.contains(&token));
    }

    #[test]
    fn unknown_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.yaml");
        TokenStore::gentoken(&path).unwrap();

        let store = TokenStore::load(&path).unwrap();
        assert!(!store.contains("not-a-real-token"));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::load(&dir.path().join("missing.yaml")).unwrap();
        assert!(!store.contains("anything"));
    }

    #[test]
    fn gentoken_appends_without_losing_earlier_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.yaml");

        let first = TokenStore::gentoken(&path).unwrap();
        let second = TokenStore::gentoken(&path).unwrap();

        let store = TokenStore::load(&path).unwrap();
        assert!(store.contains(&first));
        assert!(store.contains(&second));
    }
}
