pub mod archive_service;
pub mod broker;
pub mod client;
pub mod crypto;
pub mod expiry;
pub mod localfs_storage;
pub mod memory_storage;
pub mod object_store;
pub mod resolve;
pub mod storage;
