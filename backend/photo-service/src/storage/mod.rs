//! Object storage collaborator surface.
//!
//! The service talks to storage exclusively through the [`ObjectStore`] and
//! [`AssetStore`] traits; S3 is the production backend and an in-memory
//! implementation backs the tests.

pub mod memory;
pub mod s3;

pub use memory::{MemoryAssetStore, MemoryObjectStore};
pub use s3::{S3AssetStore, S3ObjectStore};

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Custom metadata keys recorded on upload for later retrieval by listing
pub const META_ORIGINAL_FILENAME: &str = "original-filename";
pub const META_UPLOADED_AT: &str = "uploaded-at";
pub const META_SIZE: &str = "size";
pub const META_WIDTH: &str = "width";
pub const META_HEIGHT: &str = "height";

/// A fully fetched object.
#[derive(Debug, Clone)]
pub struct ObjectBody {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Lightweight existence/metadata probe result.
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub content_type: Option<String>,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One entry of a listing page. `metadata` is absent for backends whose
/// listing API does not return custom metadata (S3); callers fall back to
/// key-derived values.
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    pub cursor: Option<String>,
    pub has_more: bool,
}

/// String-keyed object store with prefix+cursor listing.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<ObjectBody>>;

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>>;

    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<ListPage>;
}

/// Lookup for the fixed branding assets composited onto served images.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Fetch a named asset blob; `None` when the asset does not exist.
    async fn fetch(&self, name: &str) -> Result<Option<Bytes>>;
}
