//! The Store Adapter: the only component that understands the
//! on-disk layout of a content-addressed object store. Everything else
//! in this workspace depends on this trait and nothing else.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    object_name::{ObjectNameParseErr, ObjectType},
    objects::{CommitObject, DirTreeObject, ObjectCodecErr},
    repo_mode::{RepoMode, RepoModeParseErr},
    revision::{Revision, RevisionParseErr},
    ObjectName,
};

#[derive(Debug, Error)]
pub enum StoreErr {
    #[error("repository at {0:?} is not open (missing config)")]
    NotOpened(PathBuf),

    #[error("invalid repository config: {0}")]
    InvalidConfig(#[from] RepoModeParseErr),

    #[error("unknown branch {0:?}")]
    UnknownBranch(String),

    #[error("object {0} is missing from the store")]
    MissingObject(ObjectName),

    #[error("repository is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    ObjectNameParse(#[from] ObjectNameParseErr),

    #[error(transparent)]
    RevisionParse(#[from] RevisionParseErr),

    #[error(transparent)]
    ObjectCodec(#[from] ObjectCodecErr),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The fixed set of operations the rest of the core depends on. See
/// [`OstreeRepo`] for the filesystem-backed implementation.
pub trait StoreAdapter {
    fn mode(&self) -> RepoMode;

    fn list_revisions(&self) -> Result<BTreeMap<String, Revision>, StoreErr>;

    fn resolve_rev(&self, branch: &str) -> Result<Revision, StoreErr>;

    fn parent_of(&self, commit: Revision) -> Result<Option<Revision>, StoreErr>;

    /// The transitive closure of objects reachable from `commit`
    /// (commit + dirtree + dirmeta + file objects). `max_depth` bounds
    /// dirtree recursion; `0` means unlimited.
    fn traverse_commit(
        &self,
        commit: Revision,
        max_depth: u32,
    ) -> Result<BTreeSet<ObjectName>, StoreErr>;

    fn object_path(&self, name: &ObjectName) -> PathBuf;

    /// Atomically points `branch` at `checksum`. Durable on return.
    fn set_ref(&self, branch: &str, checksum: Revision) -> Result<(), StoreErr>;

    fn prune(&self, dry_run: bool) -> Result<PruneStats, StoreErr>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub total: u64,
    pub pruned: u64,
    pub bytes_freed: u64,
}

/// A filesystem-backed content-addressed repository, rooted at
/// `<root>` with the layout:
/// `<root>/objects/<xx>/<rest>`, `<root>/refs/heads/<branch>`,
/// `<root>/tmp/<staging-root>/...` (owned by the server, see
/// `ostreeup-server::staging`).
pub struct OstreeRepo {
    root: PathBuf,
    mode: RepoMode,
}

impl OstreeRepo {
    /// Opens an existing repository, reading its mode from `<root>/config`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreErr> {
        let root = root.into();
        let config_path = root.join("config");
        let config = fs::read_to_string(&config_path)
            .map_err(|_| StoreErr::NotOpened(root.clone()))?;
        let mode = parse_mode_line(&config)?;
        tracing::debug!(root = %root.display(), %mode, "opened repository");
        Ok(Self { root, mode })
    }

    /// Creates a fresh repository at `root` with the given mode. Used by
    /// tests and by tooling that bootstraps a build-side repo.
    pub fn init(root: impl Into<PathBuf>, mode: RepoMode) -> Result<Self, StoreErr> {
        let root = root.into();
        fs::create_dir_all(root.join("objects"))?;
        fs::create_dir_all(root.join("refs/heads"))?;
        fs::create_dir_all(root.join("tmp"))?;
        let mut config = fs::File::create(root.join("config"))?;
        writeln!(config, "[core]")?;
        writeln!(config, "mode = {mode}")?;
        Ok(Self { root, mode })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn refs_heads_dir(&self) -> PathBuf {
        self.root.join("refs").join("heads")
    }

    fn read_object(&self, name: &ObjectName) -> Result<Vec<u8>, StoreErr> {
        let path = self.object_path(name);
        fs::read(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                StoreErr::MissingObject(*name)
            } else {
                StoreErr::Io(err)
            }
        })
    }

    fn read_commit(&self, rev: Revision) -> Result<CommitObject, StoreErr> {
        let name = ObjectName::new(*rev.as_bytes(), ObjectType::Commit);
        CommitObject::decode(&self.read_object(&name)?).map_err(StoreErr::from)
    }

    fn walk_dirtree(
        &self,
        name: ObjectName,
        depth_remaining: Option<u32>,
        out: &mut BTreeSet<ObjectName>,
    ) -> Result<(), StoreErr> {
        if !out.insert(name) {
            return Ok(());
        }
        if depth_remaining == Some(0) {
            return Ok(());
        }
        let tree = DirTreeObject::decode(&self.read_object(&name)?)?;
        for (_, file) in &tree.files {
            out.insert(*file);
        }
        for (_, dirtree, dirmeta) in &tree.dirs {
            out.insert(*dirmeta);
            self.walk_dirtree(*dirtree, depth_remaining.map(|d| d - 1), out)?;
        }
        Ok(())
    }
}

fn parse_mode_line(config: &str) -> Result<RepoMode, StoreErr> {
    for line in config.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("mode") {
            if let Some(value) = value.trim_start().strip_prefix('=') {
                return Ok(value.trim().parse()?);
            }
        }
    }
    // OSTree repositories default to `bare` when the config omits the key.
    Ok(RepoMode::Bare)
}

impl StoreAdapter for OstreeRepo {
    fn mode(&self) -> RepoMode {
        self.mode
    }

    fn list_revisions(&self) -> Result<BTreeMap<String, Revision>, StoreErr> {
        let dir = self.refs_heads_dir();
        let mut revisions = BTreeMap::new();
        if !dir.exists() {
            return Ok(revisions);
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let branch = entry.file_name().to_string_lossy().into_owned();
            let content = fs::read_to_string(entry.path())?;
            let rev: Revision = content.trim().parse()?;
            revisions.insert(branch, rev);
        }
        Ok(revisions)
    }

    fn resolve_rev(&self, branch: &str) -> Result<Revision, StoreErr> {
        let path = self.refs_heads_dir().join(branch);
        let content = fs::read_to_string(&path)
            .map_err(|_| StoreErr::UnknownBranch(branch.to_string()))?;
        Ok(content.trim().parse()?)
    }

    fn parent_of(&self, commit: Revision) -> Result<Option<Revision>, StoreErr> {
        Ok(self.read_commit(commit)?.parent)
    }

    fn traverse_commit(
        &self,
        commit: Revision,
        max_depth: u32,
    ) -> Result<BTreeSet<ObjectName>, StoreErr> {
        let mut out = BTreeSet::new();
        let commit_name = ObjectName::new(*commit.as_bytes(), ObjectType::Commit);
        out.insert(commit_name);

        let commit_obj = self.read_commit(commit)?;
        out.insert(commit_obj.root_dirmeta);

        let depth_remaining = if max_depth == 0 { None } else { Some(max_depth) };
        self.walk_dirtree(commit_obj.root_dirtree, depth_remaining, &mut out)?;
        Ok(out)
    }

    fn object_path(&self, name: &ObjectName) -> PathBuf {
        self.root
            .join("objects")
            .join(name.shard_prefix())
            .join(name.shard_rest())
    }

    fn set_ref(&self, branch: &str, checksum: Revision) -> Result<(), StoreErr> {
        let dir = self.refs_heads_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join(branch);
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(checksum.to_string().as_bytes())?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        tracing::info!(branch, %checksum, "advanced ref");
        Ok(())
    }

    fn prune(&self, dry_run: bool) -> Result<PruneStats, StoreErr> {
        let mut reachable = BTreeSet::new();
        for rev in self.list_revisions()?.into_values() {
            let mut frontier = VecDeque::from([rev]);
            while let Some(rev) = frontier.pop_front() {
                let closure = self.traverse_commit(rev, 0)?;
                reachable.extend(closure);
                if let Some(parent) = self.parent_of(rev)? {
                    frontier.push_back(parent);
                }
            }
        }

        let objects_dir = self.root.join("objects");
        let mut stats = PruneStats::default();
        if !objects_dir.exists() {
            return Ok(stats);
        }

        for shard in fs::read_dir(&objects_dir)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let full_hex = format!(
                    "{}{}",
                    shard.file_name().to_string_lossy(),
                    file_name.split('.').next().unwrap_or_default()
                );
                let suffix = file_name.split('.').nth(1).unwrap_or_default();
                stats.total += 1;
                let name: Option<ObjectName> = format!("{full_hex}.{suffix}").parse().ok();
                let is_reachable = name.is_some_and(|n| reachable.contains(&n));
                if !is_reachable {
                    let len = entry.metadata()?.len();
                    stats.pruned += 1;
                    stats.bytes_freed += len;
                    if !dry_run {
                        fs::remove_file(entry.path())?;
                    }
                }
            }
        }
        tracing::info!(?stats, dry_run, "prune complete");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{objects::DirMetaObject, testutil::TestRepo};

    #[test]
    fn open_reads_mode_from_config() {
        let repo = TestRepo::new(RepoMode::Archive);
        let adapter = OstreeRepo::open(repo.path()).unwrap();
        assert_eq!(adapter.mode(), RepoMode::Archive);
    }

    #[test]
    fn unopened_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            OstreeRepo::open(dir.path()),
            Err(StoreErr::NotOpened(_))
        ));
    }

    #[test]
    fn set_ref_then_resolve_round_trips() {
        let repo = TestRepo::new(RepoMode::Bare);
        let adapter = OstreeRepo::open(repo.path()).unwrap();
        let rev = Revision::from_bytes([9; 32]);
        adapter.set_ref("stable", rev).unwrap();
        assert_eq!(adapter.resolve_rev("stable").unwrap(), rev);
        assert_eq!(adapter.list_revisions().unwrap()["stable"], rev);
    }

    #[test]
    fn unknown_branch_fails() {
        let repo = TestRepo::new(RepoMode::Bare);
        let adapter = OstreeRepo::open(repo.path()).unwrap();
        assert!(matches!(
            adapter.resolve_rev("nope"),
            Err(StoreErr::UnknownBranch(_))
        ));
    }

    #[test]
    fn traverse_commit_returns_full_closure() {
        let repo = TestRepo::new(RepoMode::Bare);
        let (adapter, commit) = repo.commit_with_files(&[("a.txt", b"hello"), ("b.txt", b"world")]);
        let closure = adapter.traverse_commit(commit, 0).unwrap();
        // commit + dirmeta + dirtree + 2 files
        assert_eq!(closure.len(), 5);
    }

    #[test]
    fn traverse_commit_missing_object_is_corrupt() {
        let repo = TestRepo::new(RepoMode::Bare);
        let adapter = OstreeRepo::open(repo.path()).unwrap();
        let dangling = DirMetaObject { uid: 0, gid: 0, mode: 0o755 }.name();
        let commit = CommitObject {
            parent: None,
            root_dirtree: dangling,
            root_dirmeta: dangling,
            subject: "broken".into(),
            timestamp_secs: 0,
        };
        repo.write_object(commit.name(), &commit.encode());
        let result = adapter.traverse_commit(
            Revision::from_bytes(*commit.name().checksum()),
            0,
        );
        assert!(matches!(result, Err(StoreErr::MissingObject(_))));
    }
}
