//! Output artifact encoding
//!
//! Turns the RGBA cut-out into the caller's requested format. JPEG flattens
//! the alpha channel away; every other format preserves transparency. Lossy
//! formats honor the (already clamped) quality value; PNG is encoded with
//! best compression.

use crate::{
    config::OutputFormat,
    error::{RemovalError, Result},
};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;

/// AVIF encoder speed; 1 is slowest/best, 10 is fastest
const AVIF_SPEED: u8 = 6;

/// Encode a cut-out into the requested output format.
///
/// `quality` must already be clamped to `[1, 100]`
/// (see [`crate::config::clamp_quality`]).
///
/// # Errors
/// Encoding failures from the underlying codecs.
pub fn encode_image(image: &RgbaImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Jpeg => encode_jpeg(image, quality),
        OutputFormat::WebP => encode_webp(image, quality),
        OutputFormat::Avif => encode_avif(image, quality),
        OutputFormat::Png => encode_png(image),
    }
}

fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    // JPEG has no alpha channel; flatten to opaque RGB
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), quality);
    DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder)?;
    Ok(buffer)
}

fn encode_webp(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let encoder = webp::Encoder::from_rgba(image.as_raw(), image.width(), image.height());
    let encoded = encoder
        .encode_simple(false, f32::from(quality))
        .map_err(|e| RemovalError::processing(format!("WebP encoding failed: {e:?}")))?;
    Ok(encoded.to_vec())
}

fn encode_avif(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = AvifEncoder::new_with_speed_quality(Cursor::new(&mut buffer), AVIF_SPEED, quality);
    DynamicImage::ImageRgba8(image.clone()).write_with_encoder(encoder)?;
    Ok(buffer)
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = PngEncoder::new_with_quality(
        Cursor::new(&mut buffer),
        CompressionType::Best,
        FilterType::Adaptive,
    );
    DynamicImage::ImageRgba8(image.clone()).write_with_encoder(encoder)?;
    Ok(buffer)
}
