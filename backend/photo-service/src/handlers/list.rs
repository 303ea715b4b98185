/// Listing handler - `GET /api/list`
///
/// Lists stored objects under the event prefix, maps them to photo
/// metadata (falling back to key-derived values for objects written
/// without custom metadata), sorts the page, and paginates by cursor.
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::Config;
use crate::cors;
use crate::error::{AppError, Result};
use crate::handlers::{report_failure, SharedAnalytics, SharedStore};
use crate::models::{Dimensions, ListResponse, PhotoMetadata};
use crate::storage::{
    ObjectSummary, META_HEIGHT, META_ORIGINAL_FILENAME, META_UPLOADED_AT, META_WIDTH,
};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 100;

/// Listing responses stay fresh-ish without hammering storage.
const LIST_CACHE_CONTROL: &str = "public, max-age=30";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
    pub sort: Option<String>,
}

pub async fn list_photos(
    req: HttpRequest,
    query: web::Query<ListQuery>,
    config: web::Data<Config>,
    store: web::Data<SharedStore>,
    analytics: web::Data<SharedAnalytics>,
) -> Result<HttpResponse> {
    let result = handle_list(&req, &query, &config, &store).await;
    if let Err(err) = &result {
        report_failure(analytics.get_ref(), "list", err);
    }
    result
}

async fn handle_list(
    req: &HttpRequest,
    query: &ListQuery,
    config: &Config,
    store: &SharedStore,
) -> Result<HttpResponse> {
    let store = store
        .as_ref()
        .ok_or_else(|| AppError::Storage("Object storage is not configured".to_string()))?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let prefix = format!("{}/", config.event.prefix);

    let page = store
        .list(&prefix, query.cursor.as_deref(), limit)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "storage listing failed");
            AppError::Internal("Failed to list photos".to_string())
        })?;

    let mut photos: Vec<PhotoMetadata> = page.objects.iter().map(photo_from_summary).collect();
    sort_photos(&mut photos, query.sort.as_deref().unwrap_or("newest"));

    let body = ListResponse {
        total: photos.len(),
        photos,
        has_more: page.has_more,
        cursor: page.cursor,
    };

    let mut builder = HttpResponse::Ok();
    builder.insert_header((header::CACHE_CONTROL, LIST_CACHE_CONTROL));
    if let Some(origin) = cors::response_allow_origin(req, &config.cors.allowed_origins) {
        builder.insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin));
    }
    Ok(builder.json(body))
}

/// Map one listing entry to photo metadata. Objects written by the upload
/// handler carry custom metadata; anything else (legacy or foreign objects)
/// falls back to the trailing key segment and the storage timestamps.
fn photo_from_summary(summary: &ObjectSummary) -> PhotoMetadata {
    let meta = summary.metadata.as_ref();

    let filename = meta
        .and_then(|m| m.get(META_ORIGINAL_FILENAME).cloned())
        .unwrap_or_else(|| {
            summary
                .key
                .rsplit('/')
                .next()
                .unwrap_or(&summary.key)
                .to_string()
        });

    let uploaded_at = meta
        .and_then(|m| m.get(META_UPLOADED_AT))
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or(summary.last_modified)
        .unwrap_or_else(Utc::now);

    let dimensions = meta.and_then(|m| {
        Some(Dimensions {
            width: m.get(META_WIDTH)?.parse().ok()?,
            height: m.get(META_HEIGHT)?.parse().ok()?,
        })
    });

    PhotoMetadata {
        filename,
        size: summary.size,
        content_type: content_type_for_key(&summary.key).to_string(),
        uploaded_at,
        dimensions,
        key: summary.key.clone(),
    }
}

fn sort_photos(photos: &mut [PhotoMetadata], sort: &str) {
    match sort {
        "oldest" => photos.sort_by_key(|p| p.uploaded_at),
        "name" => photos.sort_by(|a, b| a.filename.cmp(&b.filename)),
        "size" => photos.sort_by(|a, b| b.size.cmp(&a.size)),
        // unknown values fall back to the default order
        _ => photos.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at)),
    }
}

fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
