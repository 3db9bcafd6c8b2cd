//! Fixtures for building throwaway repositories in tests, both in this
//! crate and in `ostreeup-client`/`ostreeup-server`.

use std::path::Path;

use tempfile::TempDir;

use crate::{
    objects::{CommitObject, DirMetaObject, DirTreeObject},
    repo_mode::RepoMode,
    revision::Revision,
    store::{OstreeRepo, StoreAdapter},
    ObjectName,
};

/// A repository rooted in a temporary directory that is removed when
/// dropped.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new(mode: RepoMode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        OstreeRepo::init(dir.path(), mode).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn adapter(&self) -> OstreeRepo {
        OstreeRepo::open(self.dir.path()).unwrap()
    }

    /// Writes an arbitrary object's bytes directly into the live store,
    /// bypassing any validation -- used to set up corrupt-repo fixtures.
    pub fn write_object(&self, name: ObjectName, data: &[u8]) {
        let adapter = self.adapter();
        let path = adapter.object_path(&name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    /// Builds a single-commit history with the given flat file list at
    /// the tree root, writes every object into the live store, and
    /// returns the adapter plus the commit's revision.
    pub fn commit_with_files(&self, files: &[(&str, &[u8])]) -> (OstreeRepo, Revision) {
        self.commit_on(None, files)
    }

    /// Builds a commit on top of `parent` (or a root commit if `None`).
    pub fn commit_on(
        &self,
        parent: Option<Revision>,
        files: &[(&str, &[u8])],
    ) -> (OstreeRepo, Revision) {
        let adapter = self.adapter();
        let kind = adapter.mode().file_object_type();

        let mut tree = DirTreeObject::default();
        for (name, content) in files {
            let file_name = ObjectName::for_content(content, kind);
            self.write_object(file_name, content);
            tree.files.push((name.to_string(), file_name));
        }
        tree.files.sort();

        let dirmeta = DirMetaObject { uid: 0, gid: 0, mode: 0o755 };
        self.write_object(dirmeta.name(), &dirmeta.encode());
        self.write_object(tree.name(), &tree.encode());

        let commit = CommitObject {
            parent,
            root_dirtree: tree.name(),
            root_dirmeta: dirmeta.name(),
            subject: "test commit".into(),
            timestamp_secs: 1_700_000_000,
        };
        let commit_name = commit.name();
        self.write_object(commit_name, &commit.encode());

        let rev = Revision::from_bytes(*commit_name.checksum());
        (adapter, rev)
    }
}
