//! Orchestrates the four-phase publish protocol end to end: `info`,
//! Closure Builder, `queue.create`, the `queue.objects`/`queue.upload`
//! loop, and `done`. Mirrors the overall shape of a teacher-style
//! top-level "run the whole operation" function: a plain synchronous
//! driver over the lower-level client pieces, with `DELETE` on any
//! failure after the transaction has been opened.

use std::collections::BTreeMap;

use ostreeup_core::{store::StoreAdapter, wire, ObjectName};
use tracing::{info, warn};

use crate::{closure::ClosureBuilder, error::ClientErr, net::PushClient};

/// Summary of a completed push, returned to the CLI for reporting.
#[derive(Debug)]
pub struct PushOutcome {
    pub branches_updated: Vec<String>,
    pub objects_uploaded: usize,
}

/// Runs the publish protocol against `repo` for `branches` (empty ⇒
/// all local branches). On any failure after `queue.create` succeeds,
/// the server-side entry is aborted with `DELETE` before the error is
/// returned, per the protocol's S5 abort scenario.
pub fn push<S: StoreAdapter>(
    client: &PushClient,
    repo: &S,
    branches: &[String],
) -> Result<PushOutcome, ClientErr> {
    let info = client.info()?;
    info!(mode = ?info.mode, branches = info.revs.len(), "fetched server info");

    let builder = ClosureBuilder::new(repo);
    let closure = builder.build(branches, &info.revs)?;

    if closure.is_empty() {
        info!("nothing to push, every branch already matches the server");
        return Ok(PushOutcome { branches_updated: Vec::new(), objects_uploaded: 0 });
    }

    let request = wire::QueueCreateRequest {
        refs: closure.update_refs.clone(),
        objects: closure.objects.keys().copied().collect(),
    };
    let created = client.queue_create(&request)?;
    info!(id = %created.id, objects = closure.objects.len(), "opened publish transaction");

    match upload_all(client, &created.id, &closure.objects) {
        Ok(uploaded) => match client.done(&created.id) {
            Ok(()) => Ok(PushOutcome {
                branches_updated: closure.update_refs.keys().cloned().collect(),
                objects_uploaded: uploaded,
            }),
            Err(err) => {
                abort(client, &created.id);
                Err(err)
            }
        },
        Err(err) => {
            abort(client, &created.id);
            Err(err)
        }
    }
}

fn upload_all(
    client: &PushClient,
    id: &str,
    objects: &BTreeMap<ObjectName, (std::path::PathBuf, [u8; 32])>,
) -> Result<usize, ClientErr> {
    let mut uploaded = 0;
    loop {
        let missing = client.queue_missing(id)?;
        if missing.objects.is_empty() {
            break;
        }
        for name in &missing.objects {
            let (path, checksum) = objects
                .get(name)
                .ok_or_else(|| ClientErr::MissingObject(name.to_string()))?;
            let checksum_hex = hex::encode(checksum);
            client.upload(id, &name.to_string(), path, &checksum_hex)?;
            uploaded += 1;
        }
    }
    Ok(uploaded)
}

fn abort(client: &PushClient, id: &str) {
    if let Err(err) = client.delete(id) {
        warn!(id, %err, "failed to abort publish transaction after a prior error");
    }
}
