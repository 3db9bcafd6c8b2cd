use axum::{extract::{Path, State}, http::StatusCode};

use super::{error::ApiErr, state::ApiState};

/// `GET /api/v1/done/{id}` -- phase 4: finalize. Promotes every staged
/// object into the live store, then advances refs last. A failure here
/// leaves the entry stuck in FINALIZING, per the protocol: retrying
/// `done` fails with `AlreadyFinalizing` until an operator intervenes.
pub async fn handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let entry = state.queue.begin_finalize(&id)?;
    state.staging.finalize(state.store.as_ref(), &entry.objects, &entry.update_refs)?;
    state.queue.delete(&id);
    Ok(StatusCode::OK)
}
