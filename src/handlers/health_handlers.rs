//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks a storage backend is bound and
//!   reports what the process is running with

use crate::services::archive_service::ArchiveService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// 200 with the storage kind and the number of archives awaiting expiry
/// when a backend is bound, 503 otherwise.
pub async fn readyz(State(service): State<ArchiveService>) -> impl IntoResponse {
    let storage = service.store.kind();
    let ready = storage.is_some();

    let body = ReadyResponse {
        status: if ready { "ok".into() } else { "error".into() },
        storage,
        pending_expiry: service.expiry.len(),
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    storage: Option<&'static str>,
    pending_expiry: usize,
}
