//! Per-request tracing span and access log (spec §7: "every log record
//! scrubs secrets").

use axum::{extract::Request, middleware::Next, response::Response};
use bridge_common::logging::scrub;
use std::time::Instant;
use tracing::{error, info, info_span};
use uuid::Uuid;

pub async fn logging_middleware(mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = scrub(&request.uri().to_string());

    request.headers_mut().insert("x-request-id", request_id.parse().unwrap());

    let span = info_span!("http_request", request_id = %request_id, method = %method, uri = %uri);
    let response = span.in_scope(|| next.run(request)).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis();
    if status.is_server_error() {
        error!(request_id = %request_id, %status, duration_ms, "request failed with server error");
    } else if status.is_client_error() {
        info!(request_id = %request_id, %status, duration_ms, "request failed with client error");
    } else {
        info!(request_id = %request_id, %status, duration_ms, "request completed");
    }
    response
}
