use axum::extract::State;

use super::state::ApiState;

/// `GET /health`: liveness probe for process supervisors, unauthenticated
/// like `/ping`.
pub async fn handler(State(_state): State<ApiState>) -> &'static str {
    "OK\n"
}

/// `GET /ping`: the one endpoint with no auth requirement at all, used
/// by clients to check reachability before presenting a token.
pub async fn ping() -> &'static str {
    "pong"
}
