//! Stored-file persistence.
//!
//! This crate provides:
//! - The Cloudflare R2 client behind the [`ObjectStore`] trait
//! - A [`FileCatalog`] of stored-file metadata and video/subtitle associations (Redis or in-memory)
//! - [`FileBridge`], which loads and saves stored files by id

pub mod bridge;
pub mod catalog;
pub mod client;
pub mod error;
pub mod store;

pub use bridge::{FileBridge, NewStoredFile};
pub use catalog::{FileCatalog, MemoryFileCatalog, RedisFileCatalog, StoredFileRecord};
pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::{MemoryObjectStore, ObjectStore};
