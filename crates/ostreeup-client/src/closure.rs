//! The client-side Closure Builder: figures out which branches are
//! behind the server and what object closure the server needs to catch
//! up.

use std::{
    collections::BTreeMap,
    path::PathBuf,
};

use ostreeup_core::{
    revision::RevisionPair, store::StoreAdapter, ObjectName, Revision,
};

use crate::error::ClientErr;

/// The result of running the Closure Builder: what refs move where,
/// and every object the server needs, along with its on-disk path and
/// checksum (computed once here so the upload phase never re-hashes).
#[derive(Debug, Default)]
pub struct Closure {
    pub update_refs: BTreeMap<String, RevisionPair>,
    pub objects: BTreeMap<ObjectName, (PathBuf, [u8; 32])>,
}

impl Closure {
    pub fn is_empty(&self) -> bool {
        self.update_refs.is_empty()
    }
}

pub struct ClosureBuilder<'s, S> {
    store: &'s S,
}

impl<'s, S: StoreAdapter> ClosureBuilder<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Builds the closure for `branches` (all local branches if empty)
    /// relative to `remote_refs`, the server's revision map from `info`.
    pub fn build(
        &self,
        branches: &[String],
        remote_refs: &BTreeMap<String, Revision>,
    ) -> Result<Closure, ClientErr> {
        let local_refs = self.resolve_local_refs(branches)?;

        let mut update_refs = BTreeMap::new();
        let mut commits_to_traverse = Vec::new();

        for (branch, local_rev) in &local_refs {
            let server_rev = remote_refs.get(branch).copied();
            if server_rev == Some(*local_rev) {
                continue;
            }

            let mut chain = vec![*local_rev];
            let mut cursor = *local_rev;
            let converged = loop {
                match self.store.parent_of(cursor)? {
                    // the parent is already on the server: everything
                    // from here back is already published, so it does
                    // not join the closure.
                    Some(parent) if Some(parent) == server_rev => break true,
                    Some(parent) => {
                        chain.push(parent);
                        cursor = parent;
                    }
                    None => break server_rev.is_none(),
                }
            };

            if !converged {
                return Err(ClientErr::NonDescendant {
                    branch: branch.clone(),
                    server: server_rev.expect("non-convergence implies a server rev").to_string(),
                });
            }

            update_refs.insert(
                branch.clone(),
                RevisionPair { server: server_rev, client: *local_rev },
            );
            commits_to_traverse.extend(chain);
        }

        let mut objects = BTreeMap::new();
        for commit in commits_to_traverse {
            for name in self.store.traverse_commit(commit, 0)? {
                if objects.contains_key(&name) {
                    continue;
                }
                let path = self.store.object_path(&name);
                let checksum = ostreeup_core::checksum::sha256_file(&path).map_err(|source| {
                    ClientErr::Io { path: path.clone(), source }
                })?;
                objects.insert(name, (path, checksum));
            }
        }

        Ok(Closure { update_refs, objects })
    }

    fn resolve_local_refs(
        &self,
        branches: &[String],
    ) -> Result<BTreeMap<String, Revision>, ClientErr> {
        if branches.is_empty() {
            Ok(self.store.list_revisions()?)
        } else {
            let mut map = BTreeMap::new();
            for branch in branches {
                map.insert(branch.clone(), self.store.resolve_rev(branch)?);
            }
            Ok(map)
        }
    }
}
