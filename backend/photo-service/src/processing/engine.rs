//! Image transform engine: decode → resize → watermark → encode.
//!
//! CPU-bound work runs on the blocking thread pool so request handling is
//! never stalled. Watermarking degrades gracefully: a missing logo asset or
//! a failed composite is logged and skipped, never fatal to the request.

use crate::error::{AppError, Result};
use crate::processing::{calculate_responsive_dimensions, ImageFormat, ProcessingOptions};
use crate::storage::AssetStore;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageEncoder, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

/// Logo assets composited onto served images, in overlay order:
/// first anchors top-left, second bottom-right.
pub const WATERMARK_ASSET_NAMES: [&str; 2] = ["bbff-logo.png", "hmb-logo.png"];

/// Quality back-off floor for [`ImageEngine::optimize_for_web`]
const WEB_QUALITY_FLOOR: u8 = 20;
const WEB_QUALITY_START: u8 = 95;
const WEB_QUALITY_STEP: u8 = 10;

/// Fixed placement contract for the two watermark logos.
#[derive(Clone, Debug)]
pub struct WatermarkLayout {
    pub inset: u32,
    pub max_size: u32,
    pub opacity: f32,
}

impl Default for WatermarkLayout {
    fn default() -> Self {
        Self {
            inset: 20,
            max_size: 100,
            opacity: 0.8,
        }
    }
}

/// A processed image ready to serve.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Bytes,
    pub content_type: &'static str,
}

pub struct ImageEngine {
    assets: Option<Arc<dyn AssetStore>>,
    layout: WatermarkLayout,
}

impl ImageEngine {
    pub fn new(assets: Option<Arc<dyn AssetStore>>) -> Self {
        Self {
            assets,
            layout: WatermarkLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: WatermarkLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Run the full transform pipeline for one request.
    pub async fn process(
        &self,
        source: Bytes,
        options: &ProcessingOptions,
    ) -> Result<ProcessedImage> {
        let logos = if options.watermark {
            self.fetch_watermark_assets().await
        } else {
            Vec::new()
        };

        let options = options.clone();
        let layout = self.layout.clone();
        tokio::task::spawn_blocking(move || process_blocking(&source, &options, &logos, &layout))
            .await
            .map_err(|e| AppError::Processing(format!("Image task panicked: {e}")))?
    }

    /// Re-encode an image as JPEG under a byte budget by stepping quality
    /// down from 95 to a floor of 20. The floor-quality result is returned
    /// even when still over budget; this is best effort, never an error.
    pub async fn optimize_for_web(&self, source: Bytes, target_size_kb: usize) -> Result<Bytes> {
        tokio::task::spawn_blocking(move || {
            let img = image::load_from_memory(&source)
                .map_err(|e| AppError::Processing(format!("Failed to decode image: {e}")))?;
            let rgb = img.to_rgb8();
            let target_bytes = target_size_kb * 1024;

            let mut quality = WEB_QUALITY_START;
            loop {
                let mut buf = Vec::new();
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
                encoder
                    .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
                    .map_err(|e| AppError::Processing(format!("JPEG encode failed: {e}")))?;

                if buf.len() <= target_bytes || quality <= WEB_QUALITY_FLOOR {
                    return Ok(Bytes::from(buf));
                }
                quality = quality.saturating_sub(WEB_QUALITY_STEP).max(WEB_QUALITY_FLOOR);
            }
        })
        .await
        .map_err(|e| AppError::Processing(format!("Image task panicked: {e}")))?
    }

    /// Fetch the configured logo blobs. Missing assets and lookup failures
    /// are logged and skipped so a branding problem never takes down
    /// image serving.
    async fn fetch_watermark_assets(&self) -> Vec<(&'static str, Bytes)> {
        let Some(assets) = &self.assets else {
            tracing::debug!("no asset store configured; serving without watermark");
            return Vec::new();
        };

        let mut found = Vec::new();
        for name in WATERMARK_ASSET_NAMES {
            match assets.fetch(name).await {
                Ok(Some(data)) => found.push((name, data)),
                Ok(None) => {
                    tracing::warn!(asset = name, "watermark asset missing, skipping overlay");
                }
                Err(e) => {
                    tracing::warn!(asset = name, error = %e, "watermark asset lookup failed, skipping overlay");
                }
            }
        }
        found
    }
}

fn process_blocking(
    source: &[u8],
    options: &ProcessingOptions,
    logos: &[(&'static str, Bytes)],
    layout: &WatermarkLayout,
) -> Result<ProcessedImage> {
    let mut img = image::load_from_memory(source)
        .map_err(|e| AppError::Processing(format!("Failed to decode image: {e}")))?;

    img = resize(img, options);

    if !logos.is_empty() {
        img = apply_watermarks(img, logos, layout);
    }

    let data = encode_image(&img, options.format, options.quality)?;
    Ok(ProcessedImage {
        data,
        content_type: options.format.content_type(),
    })
}

/// Resize per the requested dimensions. When only one dimension is given
/// the other follows the source aspect ratio (floored), matching the URLs
/// advertised to clients.
fn resize(img: DynamicImage, options: &ProcessingOptions) -> DynamicImage {
    let (orig_w, orig_h) = img.dimensions();
    let (target_w, target_h) = match (options.width, options.height) {
        (None, None) => return img,
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let d = calculate_responsive_dimensions(orig_w, orig_h, w);
            (d.width, d.height)
        }
        (None, Some(h)) => {
            let width = (h as u64 * orig_w as u64 / orig_h as u64) as u32;
            (width, h)
        }
    };

    img.resize_exact(target_w.max(1), target_h.max(1), FilterType::Triangle)
}

fn apply_watermarks(
    img: DynamicImage,
    logos: &[(&'static str, Bytes)],
    layout: &WatermarkLayout,
) -> DynamicImage {
    let mut base = img.to_rgba8();
    let (base_w, base_h) = (base.width(), base.height());

    for (index, (name, data)) in logos.iter().enumerate() {
        let logo = match image::load_from_memory(data) {
            Ok(logo) => logo.thumbnail(layout.max_size, layout.max_size).to_rgba8(),
            Err(e) => {
                tracing::warn!(asset = name, error = %e, "failed to decode watermark asset, skipping overlay");
                continue;
            }
        };

        // First logo top-left, second bottom-right, both inset.
        let (x, y) = if index == 0 {
            (layout.inset, layout.inset)
        } else {
            (
                base_w.saturating_sub(logo.width() + layout.inset),
                base_h.saturating_sub(logo.height() + layout.inset),
            )
        };

        blend_overlay(&mut base, &logo, x, y, layout.opacity);
    }

    DynamicImage::ImageRgba8(base)
}

/// Source-over composite of `logo` onto `base` at (x0, y0), scaled by a
/// global opacity. Pixels falling outside the base are dropped.
fn blend_overlay(base: &mut RgbaImage, logo: &RgbaImage, x0: u32, y0: u32, opacity: f32) {
    for (lx, ly, pixel) in logo.enumerate_pixels() {
        let (bx, by) = (x0 + lx, y0 + ly);
        if bx >= base.width() || by >= base.height() {
            continue;
        }

        let Rgba([lr, lg, lb, la]) = *pixel;
        let alpha = (la as f32 / 255.0) * opacity;
        if alpha <= 0.0 {
            continue;
        }

        let bp = base.get_pixel_mut(bx, by);
        let src = [lr, lg, lb];
        for c in 0..3 {
            let blended = src[c] as f32 * alpha + bp.0[c] as f32 * (1.0 - alpha);
            bp.0[c] = blended.round() as u8;
        }
        bp.0[3] = bp.0[3].max(la);
    }
}

pub fn encode_image(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Bytes> {
    let mut buf = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            encoder
                .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
                .map_err(|e| AppError::Processing(format!("JPEG encode failed: {e}")))?;
        }
        ImageFormat::Png => {
            let rgba = img.to_rgba8();
            PngEncoder::new(Cursor::new(&mut buf))
                .write_image(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    image::ColorType::Rgba8,
                )
                .map_err(|e| AppError::Processing(format!("PNG encode failed: {e}")))?;
        }
        ImageFormat::Webp => {
            // Lossless encoder; the quality setting does not apply.
            let rgba = img.to_rgba8();
            WebPEncoder::new_lossless(Cursor::new(&mut buf))
                .write_image(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    image::ColorType::Rgba8,
                )
                .map_err(|e| AppError::Processing(format!("WebP encode failed: {e}")))?;
        }
    }

    Ok(Bytes::from(buf))
}
