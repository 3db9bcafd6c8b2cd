//! The Staging Engine: reifies a publish's object closure on disk with
//! all-or-nothing semantics relative to the live store, then promotes
//! it on finalize. Staged files are written to a `NamedTempFile`, then
//! persisted into place with `persist_noclobber` so a racing second
//! write to the same object name loses cleanly.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
    path::{Path, PathBuf},
};

use axum::extract::{multipart::Field, Multipart};
use ostreeup_core::{checksum::IncrementalSha256, store::StoreAdapter, ObjectName, RevisionPair};
use thiserror::Error;

/// Name of the subdirectory under `<repo>/tmp/` that the engine treats
/// as its exclusive staging root.
const STAGING_ROOT: &str = "publish-staging";

#[derive(Debug, Error)]
pub enum StagingErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("object name {0:?} could not be parsed from the upload filename")]
    InvalidObjectName(String),

    #[error("object {0} is already staged")]
    AlreadyStaged(ObjectName),

    #[error("checksum mismatch for {name}: client declared {expected}, server computed {got}")]
    BadChecksum { name: ObjectName, expected: String, got: String },

    #[error("checksum part referenced object {0} that was not staged in this request")]
    UnknownChecksumTarget(ObjectName),

    #[error("multipart field {0:?} is not one of 'file' or 'checksum'")]
    UnsupportedField(String),

    #[error("object {0} is missing from both staging and the live store")]
    MissingObject(ObjectName),

    #[error(transparent)]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error(transparent)]
    Store(#[from] ostreeup_core::StoreErr),
}

pub struct StagingEngine {
    staging_dir: PathBuf,
}

impl StagingEngine {
    /// Creates the staging root (mode 0755) if it does not already
    /// exist. Called once at server startup.
    pub fn open(repo_root: &Path) -> Result<Self, StagingErr> {
        let staging_dir = repo_root.join("tmp").join(STAGING_ROOT);
        std::fs::create_dir_all(&staging_dir)?;
        set_permissive_mode(&staging_dir)?;
        Ok(Self { staging_dir })
    }

    fn staging_path(&self, name: &ObjectName) -> PathBuf {
        self.staging_dir.join(name.shard_prefix()).join(name.shard_rest())
    }

    /// Returns the names in `wanted` that are present in neither
    /// staging nor the live store, preserving input order. Safe to
    /// call repeatedly.
    pub fn missing_objects(
        &self,
        store: &dyn StoreAdapter,
        wanted: &BTreeSet<ObjectName>,
    ) -> Vec<ObjectName> {
        wanted
            .iter()
            .filter(|name| !self.staging_path(name).exists() && !store.object_path(name).exists())
            .copied()
            .collect()
    }

    /// Ingests one upload request's multipart body: `file` parts stage
    /// bytes exclusively, `checksum` parts verify the digest of a
    /// just-staged file. Parts are processed strictly in the order
    /// they arrive.
    pub async fn ingest(&self, mut multipart: Multipart) -> Result<Vec<ObjectName>, StagingErr> {
        let mut staged = Vec::new();
        let mut pending_digests: BTreeMap<ObjectName, [u8; 32]> = BTreeMap::new();

        while let Some(mut field) = multipart.next_field().await? {
            match field.name() {
                Some("file") => {
                    let filename = field
                        .file_name()
                        .ok_or_else(|| StagingErr::InvalidObjectName(String::new()))?
                        .to_string();
                    let name: ObjectName = filename
                        .parse()
                        .map_err(|_| StagingErr::InvalidObjectName(filename.clone()))?;
                    let digest = self.stage_exclusive_stream(&name, &mut field).await?;
                    pending_digests.insert(name, digest);
                    staged.push(name);
                }
                Some("checksum") => {
                    let body = field.text().await?;
                    let (object_str, hex_digest) = body.split_once(':').ok_or_else(|| {
                        StagingErr::InvalidObjectName(body.clone())
                    })?;
                    let name: ObjectName = object_str
                        .parse()
                        .map_err(|_| StagingErr::InvalidObjectName(object_str.to_string()))?;
                    let expected = pending_digests
                        .remove(&name)
                        .ok_or(StagingErr::UnknownChecksumTarget(name))?;
                    let got = hex::encode(expected);
                    if !got.eq_ignore_ascii_case(hex_digest) {
                        std::fs::remove_file(self.staging_path(&name)).ok();
                        return Err(StagingErr::BadChecksum {
                            name,
                            expected: hex_digest.to_string(),
                            got,
                        });
                    }
                }
                Some(other) => return Err(StagingErr::UnsupportedField(other.to_string())),
                None => return Err(StagingErr::UnsupportedField(String::new())),
            }
        }

        Ok(staged)
    }

    fn stage_exclusive(&self, name: &ObjectName, bytes: &[u8]) -> Result<(), StagingErr> {
        let target = self.staging_path(name);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = tempfile::NamedTempFile::new_in(&self.staging_dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist_noclobber(&target).map_err(|err| {
            if target.exists() {
                StagingErr::AlreadyStaged(*name)
            } else {
                StagingErr::Io(err.error)
            }
        })?;
        Ok(())
    }

    /// Streams a `file` part straight to its `NamedTempFile`, hashing
    /// each chunk as it arrives so the object is never held in memory
    /// whole the way `stage_exclusive` holds it.
    async fn stage_exclusive_stream(
        &self,
        name: &ObjectName,
        field: &mut Field<'_>,
    ) -> Result<[u8; 32], StagingErr> {
        let target = self.staging_path(name);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = tempfile::NamedTempFile::new_in(&self.staging_dir)?;
        let mut hasher = IncrementalSha256::new();
        while let Some(chunk) = field.chunk().await? {
            hasher.update(&chunk);
            tmp.write_all(&chunk)?;
        }
        tmp.flush()?;
        tmp.persist_noclobber(&target).map_err(|err| {
            if target.exists() {
                StagingErr::AlreadyStaged(*name)
            } else {
                StagingErr::Io(err.error)
            }
        })?;
        Ok(hasher.finalize())
    }

    /// Promotes every staged object into the live store, then advances
    /// every ref in `update_refs`. Refs move only after every object in
    /// `objects` is confirmed present in the live store -- see
    /// `ostreeup-core::store::OstreeRepo::set_ref`.
    pub fn finalize(
        &self,
        store: &dyn StoreAdapter,
        objects: &BTreeSet<ObjectName>,
        update_refs: &BTreeMap<String, RevisionPair>,
    ) -> Result<(), StagingErr> {
        for name in objects {
            self.promote(store, name)?;
        }
        for (branch, pair) in update_refs {
            store.set_ref(branch, pair.client)?;
        }
        Ok(())
    }

    fn promote(&self, store: &dyn StoreAdapter, name: &ObjectName) -> Result<(), StagingErr> {
        let live_path = store.object_path(name);
        if live_path.exists() {
            // content-addressed: identical name implies identical content.
            return Ok(());
        }
        let staged_path = self.staging_path(name);
        if !staged_path.exists() {
            return Err(StagingErr::MissingObject(*name));
        }
        if let Some(parent) = live_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&staged_path, &live_path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_permissive_mode(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_permissive_mode(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
