/// HTTP handlers for the photo API
pub mod images;
pub mod list;
pub mod upload;

pub use images::{head_photo, serve_photo};
pub use list::list_photos;
pub use upload::upload_photos;

use crate::analytics::{self, AnalyticsSink};
use crate::cache::ImageCache;
use crate::config::Config;
use crate::cors;
use crate::error::{AppError, Result};
use crate::processing::ImageEngine;
use crate::ratelimit::RateLimiter;
use crate::storage::ObjectStore;
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;

/// Capability handles registered as app data. `None` means the capability
/// is not configured; handlers surface that per the error taxonomy.
pub type SharedStore = Option<Arc<dyn ObjectStore>>;
pub type SharedCache = Option<Arc<dyn ImageCache>>;
pub type SharedEngine = Option<Arc<ImageEngine>>;
pub type SharedLimiter = Arc<dyn RateLimiter>;
pub type SharedAnalytics = Arc<dyn AnalyticsSink>;

/// OPTIONS handler shared by every endpoint.
pub async fn preflight(req: HttpRequest, config: web::Data<Config>) -> HttpResponse {
    cors::preflight(&req, &config.cors.allowed_origins)
        .unwrap_or_else(|| HttpResponse::NoContent().finish())
}

/// Fallback for unsupported methods on a known endpoint.
pub async fn method_not_allowed(req: HttpRequest) -> Result<HttpResponse> {
    Err(AppError::MethodNotAllowed(format!(
        "{} is not supported on this endpoint",
        req.method()
    )))
}

/// Fallback for unknown paths.
pub async fn not_found() -> Result<HttpResponse> {
    Err(AppError::NotFound("Resource not found".to_string()))
}

/// Query-string deserialization failures (overflow, bad bool, negative
/// limit) surface as the standard validation envelope instead of the
/// extractor's plain-text default.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::validation(format!("Invalid query parameter: {err}")).into()
    })
}

/// Rate-limit key for the requesting client.
pub(crate) fn client_key(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .map(|ip| format!("ip:{ip}"))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

/// Log a failed request and forward it to the analytics sink. Sink errors
/// never propagate; delivery happens off the request path.
pub(crate) fn report_failure(analytics: &SharedAnalytics, endpoint: &str, err: &AppError) {
    tracing::error!(endpoint, code = err.code(), "request failed: {err}");
    analytics::emit(
        analytics.clone(),
        serde_json::json!({
            "type": "api_error",
            "endpoint": endpoint,
            "code": err.code(),
            "message": err.to_string(),
            "at": chrono::Utc::now().to_rfc3339(),
        }),
    );
}
