//! Photo service entrypoint: wires configuration to the capability handles
//! (object store, image cache, rate limiter, analytics, transform engine)
//! and starts the HTTP server. Missing capabilities degrade per endpoint
//! instead of preventing startup.

use actix_web::http::Method;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use tokio::sync::Mutex;

use photo_service::analytics::{HttpAnalyticsSink, NoopSink};
use photo_service::cache::RedisImageCache;
use photo_service::handlers::{
    self, SharedAnalytics, SharedCache, SharedEngine, SharedLimiter, SharedStore,
};
use photo_service::processing::ImageEngine;
use photo_service::ratelimit::{InMemoryRateLimiter, RateLimitConfig, RedisRateLimiter};
use photo_service::storage::{self, AssetStore, S3AssetStore, S3ObjectStore};
use photo_service::Config;

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "photo-service",
    }))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Object storage + branding assets
    let (store, assets): (SharedStore, Option<Arc<dyn AssetStore>>) =
        if let Some(bucket) = config.s3.bucket.clone() {
            let client = storage::s3::build_client(&config.s3).await;
            let object_store = S3ObjectStore::new(client.clone(), bucket.clone());
            if let Err(err) = object_store.health_check().await {
                // degraded start: per-request errors will surface the details
                tracing::warn!(error = %err, "continuing despite failed S3 health check");
            }
            let asset_store =
                S3AssetStore::new(client, bucket, config.s3.assets_prefix.clone());
            (Some(Arc::new(object_store)), Some(Arc::new(asset_store)))
        } else {
            tracing::warn!("S3_BUCKET not set; storage-backed endpoints will return 503");
            (None, None)
        };

    // Redis backs both the processed-image cache and the shared rate-limit
    // window; without it the limiter falls back to per-process counters.
    let rate_config = RateLimitConfig {
        max_requests: config.upload.rate_limit_max,
        window_seconds: config.upload.rate_limit_window_secs,
    };
    let mut cache: SharedCache = None;
    let mut limiter: SharedLimiter = Arc::new(InMemoryRateLimiter::new(rate_config.clone()));
    if let Some(url) = &config.cache.redis_url {
        match connect_redis(url).await {
            Ok(manager) => {
                limiter = Arc::new(RedisRateLimiter::new(manager.clone(), rate_config));
                cache = Some(Arc::new(RedisImageCache::with_manager(
                    Arc::new(Mutex::new(manager)),
                    Some(config.cache.ttl_seconds),
                )));
                tracing::info!("Redis connected");
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "Redis unavailable; image cache disabled, rate limiting is per-process"
                );
            }
        }
    }

    let analytics: SharedAnalytics = match &config.analytics.endpoint {
        Some(endpoint) => Arc::new(HttpAnalyticsSink::new(endpoint.clone())),
        None => Arc::new(NoopSink),
    };

    let engine: SharedEngine = if config.processing.enabled {
        Some(Arc::new(ImageEngine::new(assets)))
    } else {
        tracing::warn!("image processing disabled; image serving will return errors");
        None
    };

    let bind_addr = (config.app.host.clone(), config.app.port);
    tracing::info!(
        host = %config.app.host,
        port = config.app.port,
        env = %config.app.env,
        "starting photo-service"
    );

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(handlers::query_config())
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(cache.clone()))
            .app_data(web::Data::new(engine.clone()))
            .app_data(web::Data::new(limiter.clone()))
            .app_data(web::Data::new(analytics.clone()))
            .route("/api/v1/health", web::get().to(health))
            .service(
                web::resource("/api/upload")
                    .route(web::post().to(handlers::upload_photos))
                    .route(web::method(Method::OPTIONS).to(handlers::preflight))
                    .default_service(web::to(handlers::method_not_allowed)),
            )
            .service(
                web::resource("/api/list")
                    .route(web::get().to(handlers::list_photos))
                    .route(web::method(Method::OPTIONS).to(handlers::preflight))
                    .default_service(web::to(handlers::method_not_allowed)),
            )
            .service(
                web::resource("/api/images/{key:.*}")
                    .route(web::get().to(handlers::serve_photo))
                    .route(web::head().to(handlers::head_photo))
                    .route(web::method(Method::OPTIONS).to(handlers::preflight))
                    .default_service(web::to(handlers::method_not_allowed)),
            )
            .default_service(web::to(handlers::not_found))
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}

async fn connect_redis(url: &str) -> Result<redis::aio::ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(url)?;
    redis::aio::ConnectionManager::new(client).await
}
