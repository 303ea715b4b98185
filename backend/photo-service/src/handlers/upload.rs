/// Upload handler - `POST /api/upload`
///
/// Multipart `photos` fields are validated as a batch (any invalid file
/// rejects the whole batch before a single write), then stored concurrently
/// with per-file failure isolation: 201 when everything lands, 206 when
/// some storage writes fail.
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_multipart::Multipart;
use bytes::BytesMut;
use chrono::Utc;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;

use crate::analytics;
use crate::config::Config;
use crate::cors;
use crate::error::{AppError, Result};
use crate::handlers::{client_key, report_failure, SharedAnalytics, SharedLimiter, SharedStore};
use crate::models::{Dimensions, PhotoMetadata, UploadFailure, UploadResponse};
use crate::ratelimit::RateDecision;
use crate::storage::{
    ObjectStore, META_HEIGHT, META_ORIGINAL_FILENAME, META_SIZE, META_UPLOADED_AT, META_WIDTH,
};
use crate::validation::{
    generate_unique_filename, sanitize_filename, validate_files, IncomingFile, UploadConstraints,
};

const TOKEN_HEADER: &str = "X-Upload-Token";
const ASSERTION_HEADER: &str = "X-Access-Assertion";

pub async fn upload_photos(
    req: HttpRequest,
    payload: Multipart,
    config: web::Data<Config>,
    store: web::Data<SharedStore>,
    limiter: web::Data<SharedLimiter>,
    analytics: web::Data<SharedAnalytics>,
) -> Result<HttpResponse> {
    let result = handle_upload(&req, payload, &config, &store, &limiter, &analytics).await;
    if let Err(err) = &result {
        report_failure(analytics.get_ref(), "upload", err);
    }
    result
}

async fn handle_upload(
    req: &HttpRequest,
    payload: Multipart,
    config: &Config,
    store: &SharedStore,
    limiter: &SharedLimiter,
    analytics: &SharedAnalytics,
) -> Result<HttpResponse> {
    let store = store
        .as_ref()
        .ok_or_else(|| AppError::Storage("Object storage is not configured".to_string()))?;

    match limiter.check_and_increment(&client_key(req)).await {
        RateDecision::Allowed => {}
        RateDecision::Limited { retry_after_secs } => {
            return Err(AppError::RateLimited {
                message: "Too many uploads, try again later".to_string(),
                retry_after_secs: Some(retry_after_secs),
            });
        }
    }

    authorize(req, config)?;

    let files = collect_files(payload).await?;
    if files.is_empty() {
        return Err(AppError::validation("No files provided"));
    }

    let constraints = UploadConstraints::new(config.upload.max_file_size, config.upload.max_files);
    let failures = validate_files(&files, &constraints);
    if failures.iter().any(Option::is_some) {
        let combined: Vec<String> = files
            .iter()
            .zip(&failures)
            .filter_map(|(file, err)| {
                err.as_ref().map(|err| format!("{}: {err}", file.filename))
            })
            .collect();
        return Err(AppError::validation(format!(
            "Upload rejected: {}",
            combined.join("; ")
        )));
    }

    // All files passed validation; store them concurrently, catching
    // failures per file rather than failing the batch.
    let uploads = files.into_iter().map(|file| {
        let store = store.clone();
        let prefix = config.event.prefix.clone();
        async move { store_one(store, &prefix, file).await }
    });
    let results = futures::future::join_all(uploads).await;

    let mut photos = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(photo) => photos.push(photo),
            Err(failure) => errors.push(failure),
        }
    }

    analytics::emit(
        analytics.clone(),
        serde_json::json!({
            "type": "upload",
            "stored": photos.len(),
            "failed": errors.len(),
            "at": Utc::now().to_rfc3339(),
        }),
    );

    let all_stored = errors.is_empty();
    let body = UploadResponse {
        success: all_stored,
        photos,
        errors: if all_stored { None } else { Some(errors) },
    };

    let mut builder = if all_stored {
        HttpResponse::Created()
    } else {
        HttpResponse::PartialContent()
    };
    if let Some(origin) = cors::response_allow_origin(req, &config.cors.allowed_origins) {
        builder.insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin));
    }
    Ok(builder.json(body))
}

/// Two-tier auth: a shared token outside production; in production only the
/// presence of the access assertion is checked here - verifying its
/// signature and claims is the upstream access gateway's job.
fn authorize(req: &HttpRequest, config: &Config) -> Result<()> {
    if config.app.is_production() {
        if req.headers().get(ASSERTION_HEADER).is_none() {
            return Err(AppError::Unauthorized(
                "Missing access assertion".to_string(),
            ));
        }
        return Ok(());
    }

    let expected = config
        .upload
        .token
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Upload token is not configured".to_string()))?;
    let provided = req
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided == Some(expected) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Invalid upload token".to_string()))
    }
}

/// Drain the multipart payload, keeping every `photos` field.
async fn collect_files(mut payload: Multipart) -> Result<Vec<IncomingFile>> {
    let mut files = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::validation(format!("Invalid multipart payload: {e}")))?;

        let (name, filename) = {
            let cd = field.content_disposition();
            (
                cd.and_then(|c| c.get_name()).unwrap_or("").to_string(),
                cd.and_then(|c| c.get_filename()).map(|s| s.to_string()),
            )
        };
        let content_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| AppError::validation(format!("Invalid multipart payload: {e}")))?;
            data.extend_from_slice(&chunk);
        }

        if name != "photos" {
            continue;
        }

        files.push(IncomingFile {
            filename: filename.unwrap_or_else(|| "upload".to_string()),
            content_type,
            data: data.freeze(),
        });
    }

    Ok(files)
}

async fn store_one(
    store: Arc<dyn ObjectStore>,
    prefix: &str,
    file: IncomingFile,
) -> std::result::Result<PhotoMetadata, UploadFailure> {
    let sanitized = sanitize_filename(&file.filename);
    let key = format!("{prefix}/{}", generate_unique_filename(&sanitized));
    let uploaded_at = Utc::now();
    let size = file.data.len() as u64;
    let dimensions = probe_dimensions(&file.data);

    let mut metadata = HashMap::new();
    metadata.insert(META_ORIGINAL_FILENAME.to_string(), sanitized.clone());
    metadata.insert(META_UPLOADED_AT.to_string(), uploaded_at.to_rfc3339());
    metadata.insert(META_SIZE.to_string(), size.to_string());
    if let Some(d) = dimensions {
        metadata.insert(META_WIDTH.to_string(), d.width.to_string());
        metadata.insert(META_HEIGHT.to_string(), d.height.to_string());
    }

    match store
        .put(&key, file.data.clone(), &file.content_type, &metadata)
        .await
    {
        Ok(()) => Ok(PhotoMetadata {
            key,
            filename: sanitized,
            size,
            content_type: file.content_type,
            uploaded_at,
            dimensions,
        }),
        Err(err) => {
            tracing::error!(filename = %file.filename, error = %err, "storage write failed");
            Err(UploadFailure {
                filename: file.filename,
                error: err.to_string(),
            })
        }
    }
}

/// Opportunistic dimensions from the image header; absent when the probe
/// fails for any reason.
fn probe_dimensions(data: &[u8]) -> Option<Dimensions> {
    image::io::Reader::new(std::io::Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
        .map(|(width, height)| Dimensions { width, height })
}
