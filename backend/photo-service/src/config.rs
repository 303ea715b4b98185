/// Configuration management for photo-service
///
/// Loads configuration from environment variables with sensible defaults.
/// Optional sections (S3 bucket, Redis, analytics endpoint) model capabilities
/// that may be absent at runtime; handlers check for them per request.
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub event: EventConfig,
    pub upload: UploadConfig,
    pub cache: CacheConfig,
    pub s3: S3Config,
    pub analytics: AnalyticsConfig,
    pub processing: ProcessingConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventConfig {
    /// Storage key prefix all photos for this event live under
    pub prefix: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UploadConfig {
    pub max_file_size: u64,
    pub max_files: usize,
    /// Shared secret checked against `X-Upload-Token` outside production
    pub token: Option<String>,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    /// TTL for processed-image cache entries
    pub ttl_seconds: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct S3Config {
    /// Storage capability is absent when no bucket is configured
    pub bucket: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    /// Key prefix the watermark logo assets are stored under
    pub assets_prefix: String,
}

impl S3Config {
    pub fn is_configured(&self) -> bool {
        self.bucket.is_some()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalyticsConfig {
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProcessingConfig {
    pub enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("PHOTO_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("PHOTO_SERVICE_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            cors: CorsConfig {
                allowed_origins: parse_allowed_origins(),
            },
            event: EventConfig {
                prefix: std::env::var("EVENT_PREFIX")
                    .unwrap_or_else(|_| "event-photos".to_string()),
            },
            upload: UploadConfig {
                max_file_size: std::env::var("MAX_FILE_SIZE_MB")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(10)
                    * 1024
                    * 1024,
                max_files: std::env::var("MAX_FILES_PER_UPLOAD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
                token: std::env::var("UPLOAD_TOKEN").ok(),
                rate_limit_max: std::env::var("UPLOAD_RATE_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
                rate_limit_window_secs: std::env::var("UPLOAD_RATE_WINDOW_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            },
            cache: CacheConfig {
                redis_url: std::env::var("REDIS_URL").ok(),
                ttl_seconds: std::env::var("IMAGE_CACHE_TTL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(86400),
            },
            s3: S3Config {
                bucket: std::env::var("S3_BUCKET").ok(),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
                assets_prefix: std::env::var("ASSETS_PREFIX")
                    .unwrap_or_else(|_| "assets".to_string()),
            },
            analytics: AnalyticsConfig {
                endpoint: std::env::var("ANALYTICS_ENDPOINT").ok(),
            },
            processing: ProcessingConfig {
                enabled: std::env::var("PROCESSING_ENABLED")
                    .map(|v| v != "false" && v != "0")
                    .unwrap_or(true),
            },
        })
    }
}

fn parse_allowed_origins() -> Vec<String> {
    match std::env::var("CORS_ALLOWED_ORIGINS") {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => vec!["*".to_string()],
    }
}
