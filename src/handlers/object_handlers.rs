//! HTTP handlers for archive operations.
//! Bodies are opaque serialized archives; all storage concerns are delegated
//! to `ArchiveService`.

use crate::{errors::AppError, services::archive_service::ArchiveService};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::error;

/// `POST /objects` — store an archive and answer with its id.
pub async fn create_object(
    State(service): State<ArchiveService>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let id = service.create_archive(body.to_vec()).await.map_err(|err| {
        error!(error = %err, action = "create", "create object");
        AppError::from(err)
    })?;

    Ok((StatusCode::OK, id))
}

/// `GET /objects/{id}` — the stored archive bytes, untouched.
pub async fn get_object(
    State(service): State<ArchiveService>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let bin = service.fetch_archive(&id).await.map_err(|err| {
        if err.is_not_found() {
            tracing::info!(id = %id, "archive not found");
        } else {
            error!(id = %id, error = %err, action = "get", "get object");
        }
        AppError::from(err)
    })?;

    let mut response = Response::new(Body::from(bin));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    Ok(response)
}

/// Everything unrouted lands here.
pub async fn fallback() -> &'static str {
    "soubise"
}
