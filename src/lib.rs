//! Soubise: ephemeral storage for client-encrypted files.
//!
//! Clients seal a file with single-use key material, upload the resulting
//! [`models::archive::Archive`] and receive an opaque id. The id and the key
//! together form a `soubise://` [`models::reference_path::ReferencePath`].
//! The server keeps each archive until it expires, enforced both by a
//! background reaper and on every read.
//!
//! The in-memory lock broker only coordinates a single process. Do not run
//! several server processes against one storage directory.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shutdown;
