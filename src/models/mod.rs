//! Core data models for the ephemeral archive store.
//!
//! [`archive::Archive`] is the only record that crosses the wire and lands in
//! storage. The other types are transient: expiry tags live inside the expiry
//! heap and reference paths only ever exist on clients.

pub mod archive;
pub mod expiry_tag;
pub mod reference_path;
