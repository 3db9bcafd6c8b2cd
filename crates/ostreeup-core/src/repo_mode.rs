use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::object_name::ObjectType;

/// The storage mode of a repository, as read from its `config` file.
/// Determines whether file content is stored under the `file` or
/// `filez` object suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoMode {
    Bare,
    Archive,
    BareUser,
    BareUserOnly,
}

impl RepoMode {
    /// The object type used for file content in this mode.
    pub fn file_object_type(self) -> ObjectType {
        match self {
            RepoMode::Archive => ObjectType::FileZ,
            _ => ObjectType::File,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            RepoMode::Bare => "bare",
            RepoMode::Archive => "archive",
            RepoMode::BareUser => "bare-user",
            RepoMode::BareUserOnly => "bare-user-only",
        }
    }
}

impl fmt::Display for RepoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown repository mode {0:?}")]
pub struct RepoModeParseErr(String);

impl FromStr for RepoMode {
    type Err = RepoModeParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "bare" => RepoMode::Bare,
            "archive" | "archive-z2" => RepoMode::Archive,
            "bare-user" => RepoMode::BareUser,
            "bare-user-only" => RepoMode::BareUserOnly,
            other => return Err(RepoModeParseErr(other.to_string())),
        })
    }
}

impl serde::Serialize for RepoMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for RepoMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes() {
        assert_eq!("bare".parse::<RepoMode>().unwrap(), RepoMode::Bare);
        assert_eq!("archive".parse::<RepoMode>().unwrap(), RepoMode::Archive);
        assert_eq!("bare-user".parse::<RepoMode>().unwrap(), RepoMode::BareUser);
        assert_eq!(
            "bare-user-only".parse::<RepoMode>().unwrap(),
            RepoMode::BareUserOnly
        );
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!("bogus".parse::<RepoMode>().is_err());
    }

    #[test]
    fn archive_mode_uses_filez() {
        assert_eq!(RepoMode::Archive.file_object_type(), ObjectType::FileZ);
        assert_eq!(RepoMode::Bare.file_object_type(), ObjectType::File);
    }
}
