//! The Queue Engine: an in-memory table of active publish transactions,
//! keyed by an opaque id. All mutation happens under one lock, and the
//! invariant (no two entries share a branch) is checked inside the
//! write guard so it can't race.

use std::collections::{BTreeMap, BTreeSet};

use ostreeup_core::{ObjectName, RevisionPair};
use parking_lot::RwLock;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueErr {
    #[error("no publish entry found for id {0:?}")]
    NotFound(String),

    #[error("branch {0:?} is already being updated by another publish")]
    BranchConflict(String),

    #[error("entry {0:?} is already finalizing")]
    AlreadyFinalizing(String),

    #[error("entry {0:?} is closed for upload")]
    ClosedForUpload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Open,
    Finalizing,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub id: String,
    pub update_refs: BTreeMap<String, RevisionPair>,
    pub objects: BTreeSet<ObjectName>,
    pub state: EntryState,
}

impl Entry {
    fn branches(&self) -> impl Iterator<Item = &str> {
        self.update_refs.keys().map(String::as_str)
    }
}

/// An in-memory, lock-protected table of [`Entry`] values. Every
/// operation acquires the single lock for its whole duration, so the
/// `create` invariant (no branch overlap across active entries) is
/// checked under the same critical section that inserts the new entry.
#[derive(Default)]
pub struct QueueEngine {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl QueueEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        update_refs: BTreeMap<String, RevisionPair>,
        objects: BTreeSet<ObjectName>,
    ) -> Result<String, QueueErr> {
        let mut entries = self.entries.write();

        for branch in update_refs.keys() {
            if entries.values().any(|entry| entry.branches().any(|b| b == branch)) {
                return Err(QueueErr::BranchConflict(branch.clone()));
            }
        }

        let id = new_entry_id();
        entries.insert(
            id.clone(),
            Entry { id: id.clone(), update_refs, objects, state: EntryState::Open },
        );
        tracing::info!(id, "opened publish entry");
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Result<Entry, QueueErr> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| QueueErr::NotFound(id.to_string()))
    }

    /// Marks the entry FINALIZING via a compare-and-set on its state.
    /// Fails if the entry is already finalizing (a second concurrent
    /// `done` call) or missing.
    pub fn begin_finalize(&self, id: &str) -> Result<Entry, QueueErr> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id).ok_or_else(|| QueueErr::NotFound(id.to_string()))?;
        if entry.state == EntryState::Finalizing {
            return Err(QueueErr::AlreadyFinalizing(id.to_string()));
        }
        entry.state = EntryState::Finalizing;
        Ok(entry.clone())
    }

    /// Checks that `id` is open for upload without mutating anything.
    pub fn require_open(&self, id: &str) -> Result<(), QueueErr> {
        let entries = self.entries.read();
        let entry = entries.get(id).ok_or_else(|| QueueErr::NotFound(id.to_string()))?;
        match entry.state {
            EntryState::Open => Ok(()),
            EntryState::Finalizing => Err(QueueErr::ClosedForUpload(id.to_string())),
        }
    }

    /// Removes the entry. Idempotent: deleting an id that is already
    /// gone is not an error.
    pub fn delete(&self, id: &str) {
        self.entries.write().remove(id);
        tracing::info!(id, "removed publish entry");
    }

    /// Visits every active entry, for invariant checks and tests.
    pub fn walk(&self, mut f: impl FnMut(&Entry)) {
        for entry in self.entries.read().values() {
            f(entry);
        }
    }
}

fn new_entry_id() -> String {
    let mut bytes = [0u8; 8];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use ostreeup_core::Revision;

    use super::*;

    fn pair() -> RevisionPair {
        RevisionPair { server: None, client: Revision::from_bytes([0x11; 32]) }
    }

    #[test]
    fn create_then_get_round_trips() {
        let engine = QueueEngine::new();
        let mut refs = BTreeMap::new();
        refs.insert("stable".to_string(), pair());
        let id = engine.create(refs.clone(), BTreeSet::new()).unwrap();

        let entry = engine.get(&id).unwrap();
        assert_eq!(entry.update_refs, refs);
        assert_eq!(entry.state, EntryState::Open);
    }

    #[test]
    fn conflicting_branch_is_rejected() {
        let engine = QueueEngine::new();
        let mut refs = BTreeMap::new();
        refs.insert("stable".to_string(), pair());
        engine.create(refs.clone(), BTreeSet::new()).unwrap();

        let err = engine.create(refs, BTreeSet::new()).unwrap_err();
        assert!(matches!(err, QueueErr::BranchConflict(branch) if branch == "stable"));
    }

    #[test]
    fn second_done_while_finalizing_fails() {
        let engine = QueueEngine::new();
        let mut refs = BTreeMap::new();
        refs.insert("stable".to_string(), pair());
        let id = engine.create(refs, BTreeSet::new()).unwrap();

        engine.begin_finalize(&id).unwrap();
        let err = engine.begin_finalize(&id).unwrap_err();
        assert!(matches!(err, QueueErr::AlreadyFinalizing(_)));
    }

    #[test]
    fn upload_rejected_once_finalizing() {
        let engine = QueueEngine::new();
        let mut refs = BTreeMap::new();
        refs.insert("stable".to_string(), pair());
        let id = engine.create(refs, BTreeSet::new()).unwrap();

        engine.begin_finalize(&id).unwrap();
        let err = engine.require_open(&id).unwrap_err();
        assert!(matches!(err, QueueErr::ClosedForUpload(_)));
    }

    #[test]
    fn delete_is_idempotent() {
        let engine = QueueEngine::new();
        let mut refs = BTreeMap::new();
        refs.insert("stable".to_string(), pair());
        let id = engine.create(refs, BTreeSet::new()).unwrap();

        engine.delete(&id);
        engine.delete(&id);
        assert!(matches!(engine.get(&id), Err(QueueErr::NotFound(_))));
    }

    #[test]
    fn released_branch_can_be_reused_after_delete() {
        let engine = QueueEngine::new();
        let mut refs = BTreeMap::new();
        refs.insert("stable".to_string(), pair());
        let id = engine.create(refs.clone(), BTreeSet::new()).unwrap();
        engine.delete(&id);

        engine.create(refs, BTreeSet::new()).unwrap();
    }

    #[test]
    fn walk_visits_every_active_entry_with_disjoint_branches() {
        let engine = QueueEngine::new();
        let mut a = BTreeMap::new();
        a.insert("stable".to_string(), pair());
        let mut b = BTreeMap::new();
        b.insert("testing".to_string(), pair());
        engine.create(a, BTreeSet::new()).unwrap();
        engine.create(b, BTreeSet::new()).unwrap();

        let mut seen_branches = Vec::new();
        engine.walk(|entry| seen_branches.extend(entry.branches().map(str::to_string)));
        seen_branches.sort();
        assert_eq!(seen_branches, vec!["stable".to_string(), "testing".to_string()]);
    }
}
