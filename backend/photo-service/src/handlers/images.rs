/// Image serving - `GET|HEAD /api/images/{key}`
///
/// GET runs the transform pipeline behind the processed-image cache:
/// options are validated before any storage call, a cache hit short-circuits
/// the pipeline, and cache writes happen off the response path. HEAD is an
/// existence probe answered from object metadata alone.
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};

use crate::cache::CachedImage;
use crate::config::Config;
use crate::cors;
use crate::error::{AppError, Result};
use crate::handlers::{report_failure, SharedAnalytics, SharedCache, SharedEngine, SharedStore};
use crate::processing::{
    cache_key, resolve_key, validate_processing_options, ImageQuery, ProcessingOptions,
};

pub async fn serve_photo(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ImageQuery>,
    config: web::Data<Config>,
    store: web::Data<SharedStore>,
    cache: web::Data<SharedCache>,
    engine: web::Data<SharedEngine>,
    analytics: web::Data<SharedAnalytics>,
) -> Result<HttpResponse> {
    let result = handle_serve(&req, &path, &query, &config, &store, &cache, &engine).await;
    if let Err(err) = &result {
        report_failure(analytics.get_ref(), "images", err);
    }
    result
}

async fn handle_serve(
    req: &HttpRequest,
    raw_key: &str,
    query: &ImageQuery,
    config: &Config,
    store: &SharedStore,
    cache: &SharedCache,
    engine: &SharedEngine,
) -> Result<HttpResponse> {
    let store = store
        .as_ref()
        .ok_or_else(|| AppError::Storage("Object storage is not configured".to_string()))?;
    let engine = engine
        .as_ref()
        .ok_or_else(|| AppError::Processing("Image processing is disabled".to_string()))?;

    let accept = req
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok());
    let options = ProcessingOptions::from_query(query, accept).map_err(AppError::validation)?;

    let violations = validate_processing_options(&options);
    if !violations.is_empty() {
        return Err(AppError::validation_with_details(
            "Invalid image parameters",
            serde_json::json!(violations),
        ));
    }

    let key = resolve_key(raw_key, &config.event.prefix);
    let entry_key = cache_key(&key, &options);

    if let Some(cache) = cache.as_ref() {
        match cache.get(&entry_key).await {
            Ok(Some(hit)) => {
                return Ok(respond(req, config, &key, &options, hit, true));
            }
            Ok(None) => {}
            Err(err) => {
                // degraded cache is a miss, not a failure
                tracing::warn!(key = %entry_key, error = %err, "cache lookup failed");
            }
        }
    }

    let object = store
        .get(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Photo not found: {raw_key}")))?;

    let processed = engine.process(object.data, &options).await?;
    let image = CachedImage {
        data: processed.data,
        content_type: processed.content_type.to_string(),
    };

    if let Some(cache) = cache.as_ref() {
        let cache = cache.clone();
        let entry = image.clone();
        let ttl = config.cache.ttl_seconds;
        let entry_key = entry_key.clone();
        tokio::spawn(async move {
            if let Err(err) = cache.put(&entry_key, &entry, Some(ttl)).await {
                tracing::warn!(key = %entry_key, error = %err, "cache write failed");
            }
        });
    }

    Ok(respond(req, config, &key, &options, image, false))
}

fn respond(
    req: &HttpRequest,
    config: &Config,
    resolved_key: &str,
    options: &ProcessingOptions,
    image: CachedImage,
    cache_hit: bool,
) -> HttpResponse {
    let mut builder = HttpResponse::Ok();
    builder
        .insert_header((header::CONTENT_TYPE, image.content_type))
        .insert_header((
            header::CACHE_CONTROL,
            format!("public, max-age={}", config.cache.ttl_seconds),
        ))
        .insert_header((header::VARY, "Accept"))
        .insert_header(("X-Cache", if cache_hit { "HIT" } else { "MISS" }))
        .insert_header(("X-Original-Key", resolved_key))
        .insert_header((
            "X-Processing-Options",
            serde_json::to_string(options).unwrap_or_default(),
        ));
    if let Some(origin) = cors::response_allow_origin(req, &config.cors.allowed_origins) {
        builder.insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin));
    }
    builder.body(image.data)
}

pub async fn head_photo(
    req: HttpRequest,
    path: web::Path<String>,
    config: web::Data<Config>,
    store: web::Data<SharedStore>,
    analytics: web::Data<SharedAnalytics>,
) -> Result<HttpResponse> {
    let result = handle_head(&req, &path, &config, &store).await;
    if let Err(err) = &result {
        report_failure(analytics.get_ref(), "images", err);
    }
    result
}

async fn handle_head(
    req: &HttpRequest,
    raw_key: &str,
    config: &Config,
    store: &SharedStore,
) -> Result<HttpResponse> {
    let store = store
        .as_ref()
        .ok_or_else(|| AppError::Storage("Object storage is not configured".to_string()))?;

    let key = resolve_key(raw_key, &config.event.prefix);
    let head = store
        .head(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Photo not found: {raw_key}")))?;

    let mut builder = HttpResponse::Ok();
    builder
        .insert_header((
            header::CONTENT_TYPE,
            head.content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        ))
        .insert_header((
            header::CACHE_CONTROL,
            format!("public, max-age={}", config.cache.ttl_seconds),
        ))
        .no_chunking(head.size);
    if let Some(modified) = head.last_modified {
        builder.insert_header((header::LAST_MODIFIED, http_date(&modified)));
    }
    if let Some(origin) = cors::response_allow_origin(req, &config.cors.allowed_origins) {
        builder.insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin));
    }
    Ok(builder.finish())
}

/// RFC 7231 IMF-fixdate, always GMT.
fn http_date(at: &DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
