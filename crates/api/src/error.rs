//! Maps `BridgeError` onto the HTTP response shape in spec §7:
//! `{error, detail?, hint?}` with the matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bridge_common::BridgeError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
    hint: Option<String>,
}

pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BridgeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BridgeError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.code(),
            detail: self.0.to_string(),
            hint: self.0.hint().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}
