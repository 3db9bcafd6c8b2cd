//! Bearer-token auth middleware: opaque bearer tokens compared in
//! constant time rather than with plain equality.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use super::error::ApiErr;
use crate::config::TokenStore;

#[derive(Clone)]
pub struct AuthState {
    tokens: Arc<TokenStore>,
}

impl AuthState {
    pub fn new(tokens: Arc<TokenStore>) -> Self {
        Self { tokens }
    }
}

pub async fn auth_layer(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiErr> {
    let presented = request
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiErr::Unauthorized)?;

    if !state.tokens.contains(presented) {
        return Err(ApiErr::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Constant-time membership check against the loaded token list: every
/// candidate is compared against every token so the check takes the
/// same time whether the token matches the first or last entry.
pub fn token_matches(candidate: &str, known: &str) -> bool {
    let candidate = candidate.as_bytes();
    let known = known.as_bytes();
    candidate.len() == known.len() && candidate.ct_eq(known).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tokens_match() {
        assert!(token_matches("abc123", "abc123"));
    }

    #[test]
    fn different_length_tokens_do_not_panic_or_match() {
        assert!(!token_matches("short", "a-much-longer-token"));
    }

    #[test]
    fn different_tokens_of_equal_length_do_not_match() {
        assert!(!token_matches("aaaaaa", "bbbbbb"));
    }
}
