use std::{fmt, str::FromStr};

use thiserror::Error;

/// The type of an object, encoded as the suffix of its [`ObjectName`].
///
/// `FileZ` is only valid in `archive` mode repositories; everywhere else
/// file content is stored under the `File` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Commit,
    DirTree,
    DirMeta,
    File,
    FileZ,
}

impl ObjectType {
    const fn suffix(self) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::DirTree => "dirtree",
            ObjectType::DirMeta => "dirmeta",
            ObjectType::File => "file",
            ObjectType::FileZ => "filez",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        Some(match s {
            "commit" => ObjectType::Commit,
            "dirtree" => ObjectType::DirTree,
            "dirmeta" => ObjectType::DirMeta,
            "file" => ObjectType::File,
            "filez" => ObjectType::FileZ,
            _ => return None,
        })
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// The name of an object in the store: a SHA-256 checksum plus a type
/// suffix, e.g. `af31...9c.dirtree`. Immutable once constructed; the
/// checksum is never recomputed after parsing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName {
    checksum: [u8; 32],
    kind: ObjectType,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectNameParseErr {
    #[error("object name is missing a '.' separator: {0:?}")]
    MissingSeparator(String),

    #[error("object checksum must be 64 lowercase hex characters, got {0:?}")]
    InvalidChecksum(String),

    #[error("unknown object type suffix {0:?}")]
    UnknownSuffix(String),
}

impl ObjectName {
    pub fn new(checksum: [u8; 32], kind: ObjectType) -> Self {
        Self { checksum, kind }
    }

    /// Derives an object's name from its content, the way every object
    /// in the store is actually named: by the SHA-256 of its bytes.
    pub fn for_content(data: &[u8], kind: ObjectType) -> Self {
        Self::new(crate::checksum::sha256_bytes(data), kind)
    }

    pub fn checksum(&self) -> &[u8; 32] {
        &self.checksum
    }

    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }

    pub fn kind(&self) -> ObjectType {
        self.kind
    }

    /// The on-disk sharding prefix: the first 2 hex characters of the
    /// checksum, matching the live store's `<repo>/objects/<xx>/<rest>`
    /// layout.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.checksum[..1])
    }

    pub fn shard_rest(&self) -> String {
        let hex = self.checksum_hex();
        format!("{}.{}", &hex[2..], self.kind.suffix())
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.checksum_hex(), self.kind.suffix())
    }
}

impl fmt::Debug for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for ObjectName {
    type Err = ObjectNameParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (checksum_hex, suffix) = s
            .split_once('.')
            .ok_or_else(|| ObjectNameParseErr::MissingSeparator(s.to_string()))?;

        if checksum_hex.len() != 64
            || !checksum_hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        {
            return Err(ObjectNameParseErr::InvalidChecksum(checksum_hex.to_string()));
        }

        let mut checksum = [0u8; 32];
        hex::decode_to_slice(checksum_hex, &mut checksum)
            .map_err(|_| ObjectNameParseErr::InvalidChecksum(checksum_hex.to_string()))?;

        let kind = ObjectType::from_suffix(suffix)
            .ok_or_else(|| ObjectNameParseErr::UnknownSuffix(suffix.to_string()))?;

        Ok(Self { checksum, kind })
    }
}

impl serde::Serialize for ObjectName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ObjectName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let name = ObjectName::new([0x7a; 32], ObjectType::DirTree);
        let rendered = name.to_string();
        assert_eq!(rendered, format!("{}.dirtree", "7a".repeat(32)));
        let parsed: ObjectName = rendered.parse().unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn rejects_missing_separator() {
        let err = "deadbeef".parse::<ObjectName>().unwrap_err();
        assert_eq!(err, ObjectNameParseErr::MissingSeparator("deadbeef".into()));
    }

    #[test]
    fn rejects_short_checksum() {
        let err = "abcd.commit".parse::<ObjectName>().unwrap_err();
        assert!(matches!(err, ObjectNameParseErr::InvalidChecksum(_)));
    }

    #[test]
    fn rejects_uppercase_checksum() {
        let hex = "A".repeat(64);
        let err = format!("{hex}.commit").parse::<ObjectName>().unwrap_err();
        assert!(matches!(err, ObjectNameParseErr::InvalidChecksum(_)));
    }

    #[test]
    fn rejects_unknown_suffix() {
        let hex = "0".repeat(64);
        let err = format!("{hex}.blob").parse::<ObjectName>().unwrap_err();
        assert_eq!(err, ObjectNameParseErr::UnknownSuffix("blob".into()));
    }
}
