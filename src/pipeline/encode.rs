//! Image encoding: `DynamicImage` → bounded-resolution base64 JPEG.
//!
//! VLM APIs accept images as base64 data embedded in the JSON request body.
//! Catalog pages and price screenshots compress far better as JPEG than PNG,
//! and the quality knob lets price-table extraction trade payload size for
//! digit crispness. The longest edge is capped before encoding so an A3
//! catalog spread never produces a multi-megabyte request.

use crate::config::ExtractionConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Re-encode a rasterised unit image as a base64 JPEG ready for the VLM API.
///
/// Images whose longest edge exceeds `config.max_image_edge` are downscaled
/// proportionally (Lanczos3 — text edges survive resampling much better than
/// with bilinear). The alpha channel is discarded; JPEG has none and the
/// rasteriser emits opaque pages anyway.
pub fn encode_unit_image(
    img: &DynamicImage,
    config: &ExtractionConfig,
) -> Result<ImageData, image::ImageError> {
    let max_edge = config.max_image_edge;
    let resized;
    let img = if img.width().max(img.height()) > max_edge {
        resized = img.resize(max_edge, max_edge, FilterType::Lanczos3);
        &resized
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), config.jpeg_quality);
    rgb.write_with_encoder(encoder)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64 (quality {})",
        img.width(),
        img.height(),
        b64.len(),
        config.jpeg_quality
    );

    Ok(ImageData::new(b64, "image/jpeg").with_detail("high"))
}
