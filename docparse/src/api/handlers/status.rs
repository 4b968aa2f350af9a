//! Liveness endpoint.

use axum::Json;

use crate::api::models::status::StatusResponse;

#[utoipa::path(
    get,
    path = "/test",
    tag = "status",
    summary = "Liveness check",
    description = "Returns a fixed status message. Does not touch storage.",
    responses(
        (status = 200, description = "Server is up", body = StatusResponse),
    )
)]
pub async fn server_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "Server is running".to_string(),
    })
}
