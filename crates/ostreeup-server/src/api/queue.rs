use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use ostreeup_core::wire::{QueueCreateRequest, QueueCreateResponse, QueueObjectsResponse};

use super::{error::ApiErr, state::ApiState};

/// `POST /api/v1/queue` -- phase 2: open a publish transaction.
pub async fn create(
    State(state): State<ApiState>,
    Json(request): Json<QueueCreateRequest>,
) -> Result<Json<QueueCreateResponse>, ApiErr> {
    for (branch, pair) in &request.refs {
        if pair.is_noop() {
            return Err(ApiErr::Malformed(format!(
                "branch {branch:?} submitted with client revision equal to server revision"
            )));
        }
    }

    let objects = request.objects.into_iter().collect();
    let id = state.queue.create(request.refs, objects)?;
    Ok(Json(QueueCreateResponse { id }))
}

/// `GET /api/v1/queue/{id}` -- phase 3a: which objects are still
/// needed. Idempotent: present objects (staged or live) are never
/// returned.
pub async fn missing(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<QueueObjectsResponse>, ApiErr> {
    let entry = state.queue.get(&id)?;
    let objects = state.staging.missing_objects(state.store.as_ref(), &entry.objects);
    Ok(Json(QueueObjectsResponse { objects }))
}

/// `PUT /api/v1/queue/{id}` -- phase 3b: stream one or more objects in.
pub async fn upload(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<StatusCode, ApiErr> {
    state.queue.require_open(&id)?;
    state.staging.ingest(multipart).await?;
    Ok(StatusCode::OK)
}

/// `DELETE /api/v1/queue/{id}` -- abort. Staged files are intentionally
/// left behind for operator forensics.
pub async fn delete(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    state.queue.delete(&id);
    Ok(StatusCode::OK)
}
