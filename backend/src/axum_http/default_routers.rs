use axum::{http::StatusCode, response::IntoResponse};

use crate::axum_http::error_responses::error_response;

pub async fn not_found() -> impl IntoResponse {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}
