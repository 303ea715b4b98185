/// Wire models shared by the upload, list, and serving endpoints
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pixel dimensions, recorded opportunistically at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Metadata describing one stored photo.
///
/// `key` is the full storage address (`<eventPrefix>/<generatedName>`) and is
/// immutable once written. `filename` is the sanitized original name and is
/// not guaranteed unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    pub key: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

/// Body of `GET /api/list` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub photos: Vec<PhotoMetadata>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub total: usize,
}

/// One failed file in a partially successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFailure {
    pub filename: String,
    pub error: String,
}

/// Body of `POST /api/upload` responses (201 all stored, 206 partial).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub photos: Vec<PhotoMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<UploadFailure>>,
}
