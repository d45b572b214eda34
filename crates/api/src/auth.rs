//! `Authorization: Bearer <api_secret>` check for every non-public route
//! (spec §6). Uses constant-time comparison, same as the webhook signature
//! verifier, so timing doesn't leak how much of the secret matched.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn require_bearer_token(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(bridge_common::BridgeError::Unauthorized("missing bearer token".to_string()).into());
    };

    let expected = state.api_secret.as_bytes();
    let provided = token.as_bytes();
    let matches = expected.len() == provided.len() && expected.ct_eq(provided).unwrap_u8() == 1;
    if !matches {
        return Err(bridge_common::BridgeError::Unauthorized("invalid bearer token".to_string()).into());
    }

    Ok(next.run(request).await)
}
