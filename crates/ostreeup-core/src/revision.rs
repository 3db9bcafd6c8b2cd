use std::{fmt, str::FromStr};

use thiserror::Error;

/// A commit id: 64 lowercase hex characters (SHA-256 of the commit
/// object's content).
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision([u8; 32]);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("revision must be 64 lowercase hex characters, got {0:?}")]
pub struct RevisionParseErr(String);

impl Revision {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Revision {
    type Err = RevisionParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Err(RevisionParseErr(s.to_string()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| RevisionParseErr(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Revision {
    type Error = RevisionParseErr;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Revision> for String {
    fn from(value: Revision) -> Self {
        value.to_string()
    }
}

/// The server and client revisions for one branch being published.
///
/// `server` is `None` when the branch does not yet exist on the
/// production side. `client` and `server` are always distinct for any
/// branch that was actually submitted to `queue.create` -- see
/// [`RevisionPair::is_noop`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RevisionPair {
    pub server: Option<Revision>,
    pub client: Revision,
}

impl RevisionPair {
    pub fn is_noop(&self) -> bool {
        self.server == Some(self.client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let rev = Revision::from_bytes([0x11; 32]);
        let s = rev.to_string();
        assert_eq!(s.parse::<Revision>().unwrap(), rev);
    }

    #[test]
    fn rejects_bad_length() {
        assert!("abcd".parse::<Revision>().is_err());
    }

    #[test]
    fn noop_pair_detected() {
        let rev = Revision::from_bytes([1; 32]);
        let pair = RevisionPair { server: Some(rev), client: rev };
        assert!(pair.is_noop());
    }
}
