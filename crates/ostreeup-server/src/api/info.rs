use axum::{extract::State, Json};

use ostreeup_core::wire::InfoResponse;

use super::{error::ApiErr, state::ApiState};

/// `GET /api/v1/info` -- phase 1 of the publish protocol: report the
/// repository mode and every branch's current revision.
pub async fn handler(State(state): State<ApiState>) -> Result<Json<InfoResponse>, ApiErr> {
    let revs = state.store.list_revisions()?;
    Ok(Json(InfoResponse { mode: state.store.mode(), revs }))
}
