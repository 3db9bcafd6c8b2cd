//! The on-disk encoding of `commit` and `dirtree` object content.
//!
//! The underlying object store treats these as opaque, content-addressed
//! bytes; this module is simply *a* concrete encoding for that content,
//! so [`crate::store`] has something real to traverse. It is never
//! exposed past the Store Adapter boundary -- callers only ever see
//! [`crate::ObjectName`] and [`crate::Revision`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{object_name::ObjectType, revision::Revision, ObjectName};

#[derive(Debug, Error)]
pub enum ObjectCodecErr {
    #[error("failed to encode object: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A commit: points at a parent commit (if any) and a root dirtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitObject {
    pub parent: Option<Revision>,
    pub root_dirtree: ObjectName,
    pub root_dirmeta: ObjectName,
    pub subject: String,
    pub timestamp_secs: u64,
}

impl CommitObject {
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("CommitObject serializes infallibly")
    }

    pub fn decode(data: &[u8]) -> Result<Self, ObjectCodecErr> {
        Ok(serde_json::from_slice(data)?)
    }

    /// The object name for this commit, derived from its encoded bytes.
    pub fn name(&self) -> ObjectName {
        ObjectName::for_content(&self.encode(), ObjectType::Commit)
    }
}

/// A directory tree: names of immediate children, pointing at file
/// objects and nested dirtree/dirmeta pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirTreeObject {
    /// `(name, file object)`, sorted by name.
    pub files: Vec<(String, ObjectName)>,
    /// `(name, dirtree, dirmeta)`, sorted by name.
    pub dirs: Vec<(String, ObjectName, ObjectName)>,
}

impl DirTreeObject {
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("DirTreeObject serializes infallibly")
    }

    pub fn decode(data: &[u8]) -> Result<Self, ObjectCodecErr> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn name(&self) -> ObjectName {
        ObjectName::for_content(&self.encode(), ObjectType::DirTree)
    }
}

/// Directory metadata (uid/gid/mode/xattrs). This system never
/// interprets the bytes, only checksums and stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirMetaObject {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

impl DirMetaObject {
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("DirMetaObject serializes infallibly")
    }

    pub fn decode(data: &[u8]) -> Result<Self, ObjectCodecErr> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn name(&self) -> ObjectName {
        ObjectName::for_content(&self.encode(), ObjectType::DirMeta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_round_trips() {
        let commit = CommitObject {
            parent: None,
            root_dirtree: ObjectName::new([1; 32], ObjectType::DirTree),
            root_dirmeta: ObjectName::new([2; 32], ObjectType::DirMeta),
            subject: "initial commit".into(),
            timestamp_secs: 1_700_000_000,
        };
        let encoded = commit.encode();
        assert_eq!(CommitObject::decode(&encoded).unwrap(), commit);
    }

    #[test]
    fn dirtree_name_is_stable_for_same_content() {
        let tree = DirTreeObject {
            files: vec![("a.txt".into(), ObjectName::new([3; 32], ObjectType::File))],
            dirs: vec![],
        };
        let a = tree.name();
        let b = tree.clone().name();
        assert_eq!(a, b);
    }
}
