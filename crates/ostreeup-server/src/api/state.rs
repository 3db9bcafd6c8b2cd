use std::sync::Arc;

use ostreeup_core::store::StoreAdapter;

use crate::{queue::QueueEngine, staging::StagingEngine};

/// Shared state handed to every Wire Layer handler, mirroring the
/// teacher's per-API `*ApiState` structs (e.g. `MetastoreApiState`).
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn StoreAdapter + Send + Sync>,
    pub queue: Arc<QueueEngine>,
    pub staging: Arc<StagingEngine>,
}

impl ApiState {
    pub fn new(
        store: Arc<dyn StoreAdapter + Send + Sync>,
        queue: Arc<QueueEngine>,
        staging: Arc<StagingEngine>,
    ) -> Self {
        Self { store, queue, staging }
    }
}
