//! Image processing contracts: request options, format negotiation,
//! responsive URL generation, and the shared cache-key derivation.
//!
//! The cache key is derived in exactly one place (`cache_key`) so the
//! serving handler and the processing adapter can never disagree on
//! entry identity.

pub mod engine;

pub use engine::{ImageEngine, ProcessedImage};

use crate::models::Dimensions;
use serde::{Deserialize, Serialize};

/// Inclusive bounds on requested output dimensions
pub const MIN_DIMENSION: u32 = 1;
pub const MAX_DIMENSION: u32 = 4000;

pub const DEFAULT_QUALITY: u8 = 90;

/// URL prefix the transform tier rewrites into `/api/images` requests
pub const TRANSFORM_URL_PREFIX: &str = "/cdn-cgi/image";

/// Output format for a processed image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// Per-request transform options, parsed from query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: u8,
    pub format: ImageFormat,
    pub watermark: bool,
}

/// Query parameters accepted by `GET /api/images/{key}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageQuery {
    pub w: Option<u32>,
    pub h: Option<u32>,
    pub q: Option<u8>,
    pub format: Option<String>,
    pub watermark: Option<bool>,
}

impl ProcessingOptions {
    /// Build options from the query string, negotiating the format from the
    /// `Accept` header when none is requested explicitly.
    pub fn from_query(query: &ImageQuery, accept: Option<&str>) -> Result<Self, String> {
        let format = match query.format.as_deref() {
            Some(raw) => ImageFormat::parse(raw)
                .ok_or_else(|| format!("format must be one of jpeg|png|webp, got {raw}"))?,
            None => negotiate_format(accept),
        };

        Ok(Self {
            width: query.w,
            height: query.h,
            quality: query.q.unwrap_or(DEFAULT_QUALITY),
            format,
            watermark: query.watermark.unwrap_or(true),
        })
    }
}

/// Bounds-check options without mutating them. Returns one message per
/// violated field; an empty vec means the options are acceptable.
pub fn validate_processing_options(options: &ProcessingOptions) -> Vec<String> {
    let mut violations = Vec::new();

    if let Some(w) = options.width {
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&w) {
            violations.push(format!(
                "width must be between {MIN_DIMENSION} and {MAX_DIMENSION}, got {w}"
            ));
        }
    }
    if let Some(h) = options.height {
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&h) {
            violations.push(format!(
                "height must be between {MIN_DIMENSION} and {MAX_DIMENSION}, got {h}"
            ));
        }
    }
    if options.quality == 0 || options.quality > 100 {
        violations.push(format!(
            "quality must be between 1 and 100, got {}",
            options.quality
        ));
    }

    violations
}

/// Two-way format negotiation: webp when the client advertises support,
/// jpeg otherwise.
pub fn negotiate_format(accept: Option<&str>) -> ImageFormat {
    match accept {
        Some(header) if header.contains("image/webp") => ImageFormat::Webp,
        _ => ImageFormat::Jpeg,
    }
}

/// Scale original dimensions to a target width, flooring the height.
pub fn calculate_responsive_dimensions(
    orig_width: u32,
    orig_height: u32,
    target_width: u32,
) -> Dimensions {
    // Integer division floors; rounding to nearest would disagree with the
    // URLs already handed out to clients.
    let height = (target_width as u64 * orig_height as u64 / orig_width as u64) as u32;
    Dimensions {
        width: target_width,
        height,
    }
}

/// Deterministic cache identity for a processed image. The storage key is
/// reduced to word characters plus dot and hyphen, then the six option
/// fields are appended underscore-joined.
pub fn cache_key(resolved_key: &str, options: &ProcessingOptions) -> String {
    let safe_key: String = resolved_key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "img_{}_{}_{}_{}_{}_{}",
        safe_key,
        options
            .width
            .map(|w| w.to_string())
            .unwrap_or_else(|| "auto".to_string()),
        options
            .height
            .map(|h| h.to_string())
            .unwrap_or_else(|| "auto".to_string()),
        options.quality,
        options.format.as_str(),
        options.watermark,
    )
}

/// URL for a thumbnail rendition through the transform tier.
pub fn generate_thumbnail_url(key: &str, width: u32, quality: u8) -> String {
    format!("{TRANSFORM_URL_PREFIX}/width={width},quality={quality}/api/images/{key}")
}

/// The fixed responsive tiers handed to gallery clients.
#[derive(Debug, Clone, Serialize)]
pub struct ResponsiveUrls {
    pub thumbnail: String,
    pub small: String,
    pub medium: String,
    pub large: String,
    pub original: String,
}

pub fn generate_responsive_urls(key: &str) -> ResponsiveUrls {
    ResponsiveUrls {
        thumbnail: generate_thumbnail_url(key, 150, 80),
        small: generate_thumbnail_url(key, 400, 85),
        medium: generate_thumbnail_url(key, 800, 90),
        large: generate_thumbnail_url(key, 1200, 95),
        original: format!("/api/images/{key}"),
    }
}

/// Resolve a request key against the event prefix without double-prefixing.
pub fn resolve_key(raw: &str, event_prefix: &str) -> String {
    if raw.starts_with(&format!("{event_prefix}/")) {
        raw.to_string()
    } else {
        format!("{event_prefix}/{raw}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_options() -> ProcessingOptions {
        ProcessingOptions {
            width: None,
            height: None,
            quality: DEFAULT_QUALITY,
            format: ImageFormat::Jpeg,
            watermark: true,
        }
    }

    #[test]
    fn test_from_query_defaults() {
        let opts = ProcessingOptions::from_query(&ImageQuery::default(), None).unwrap();
        assert_eq!(opts.quality, 90);
        assert_eq!(opts.format, ImageFormat::Jpeg);
        assert!(opts.watermark);
        assert!(opts.width.is_none());
    }

    #[test]
    fn test_format_negotiation() {
        assert_eq!(
            negotiate_format(Some("image/avif,image/webp,*/*")),
            ImageFormat::Webp
        );
        assert_eq!(negotiate_format(Some("image/png")), ImageFormat::Jpeg);
        assert_eq!(negotiate_format(None), ImageFormat::Jpeg);
    }

    #[test]
    fn test_explicit_format_wins_over_accept() {
        let query = ImageQuery {
            format: Some("png".to_string()),
            ..ImageQuery::default()
        };
        let opts = ProcessingOptions::from_query(&query, Some("image/webp")).unwrap();
        assert_eq!(opts.format, ImageFormat::Png);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let query = ImageQuery {
            format: Some("avif".to_string()),
            ..ImageQuery::default()
        };
        assert!(ProcessingOptions::from_query(&query, None).is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let mut opts = default_options();
        opts.width = Some(5000);
        let violations = validate_processing_options(&opts);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("between 1 and 4000"));

        opts.width = Some(4000);
        opts.height = Some(1);
        assert!(validate_processing_options(&opts).is_empty());

        opts.quality = 0;
        let violations = validate_processing_options(&opts);
        assert!(violations[0].contains("quality"));
    }

    #[test]
    fn test_responsive_dimensions_floor() {
        let d = calculate_responsive_dimensions(1920, 1080, 800);
        assert_eq!((d.width, d.height), (800, 450));

        // 400 * 1920 / 1080 = 711.11..; floor, not round-to-nearest
        let d = calculate_responsive_dimensions(1080, 1920, 400);
        assert_eq!((d.width, d.height), (400, 711));
    }

    #[test]
    fn test_responsive_urls_match_thumbnail_pattern() {
        let key = "event-photos/1700000000000-ab12cd.jpg";
        let urls = generate_responsive_urls(key);
        assert_eq!(urls.medium, generate_thumbnail_url(key, 800, 90));
        assert_eq!(urls.thumbnail, generate_thumbnail_url(key, 150, 80));
        assert_eq!(urls.original, format!("/api/images/{key}"));
        assert!(urls
            .large
            .starts_with("/cdn-cgi/image/width=1200,quality=95/"));
    }

    #[test]
    fn test_cache_key_sanitizes_and_appends_options() {
        let mut opts = default_options();
        opts.width = Some(300);
        let key = cache_key("event-photos/spring fling!.jpg", &opts);
        assert_eq!(
            key,
            "img_event-photos_spring_fling_.jpg_300_auto_90_jpeg_true"
        );
    }

    #[test]
    fn test_cache_key_distinguishes_options() {
        let a = default_options();
        let mut b = default_options();
        b.watermark = false;
        assert_ne!(cache_key("k.jpg", &a), cache_key("k.jpg", &b));
    }

    #[test]
    fn test_resolve_key_guards_double_prefix() {
        assert_eq!(
            resolve_key("event-photos/a.jpg", "event-photos"),
            "event-photos/a.jpg"
        );
        assert_eq!(resolve_key("a.jpg", "event-photos"), "event-photos/a.jpg");
        // a key that merely shares a name prefix is still prefixed
        assert_eq!(
            resolve_key("event-photos-old/a.jpg", "event-photos"),
            "event-photos/event-photos-old/a.jpg"
        );
    }
}
