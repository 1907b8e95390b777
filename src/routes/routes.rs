//! Defines routes for archive operations.
//!
//! ## Structure
//! - `POST /objects`      — store a serialized archive, responds with its id
//! - `GET  /objects/{id}` — fetch a serialized archive (404 once expired)
//! - `GET  /healthz`, `GET /readyz` — probes
//!
//! Anything else answers with a plain `soubise`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{create_object, fallback, get_object},
    },
    middleware::request_identifier,
    services::archive_service::ArchiveService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

pub const CREATE_OBJECT: &str = "/objects";
pub const GET_OBJECT: &str = "/objects/{id}";

/// Largest archive body accepted on upload.
pub const MAX_ARCHIVE_BYTES: usize = 64 * 1024 * 1024;

/// Path a client requests to fetch `id`.
pub fn object_path(id: &str) -> String {
    format!("{CREATE_OBJECT}/{id}")
}

/// Build the router. State (`ArchiveService`) is attached by the caller.
pub fn routes() -> Router<ArchiveService> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(CREATE_OBJECT, post(create_object))
        .route(GET_OBJECT, get(get_object))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(MAX_ARCHIVE_BYTES))
        .layer(middleware::from_fn(request_identifier))
}
