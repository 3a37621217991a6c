//! Image pre- and post-processing around model inference
//!
//! Handles the conversion between uploaded images and the normalized NCHW
//! tensors the segmentation models expect, and the reverse mapping from the
//! predicted matte back to a full-resolution alpha mask.

use crate::{
    error::{RemovalError, Result},
    models::ModelSpec,
};
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};
use ndarray::Array4;

/// Padding color used when letterboxing the input onto the model canvas
const PADDING_COLOR: [u8; 3] = [255, 255, 255];

/// Mask values below this cutoff are treated as background after smoothing
const MASK_CUTOFF: u8 = 127;

/// Parameters mapping tensor coordinates back to original image coordinates
#[derive(Debug, Clone)]
struct InverseTransform {
    /// Scale factor applied during preprocessing
    scale: f32,
    /// X offset used for centering on the canvas
    offset_x: u32,
    /// Y offset used for centering on the canvas
    offset_y: u32,
    /// Matte width in tensor coordinates
    mask_width: u32,
    /// Matte height in tensor coordinates
    mask_height: u32,
}

/// Convert an image into the model's normalized NCHW input tensor.
///
/// The image is converted to RGB, resized preserving aspect ratio, centered
/// on a white square canvas of the model's input size, and normalized with
/// the model's per-channel mean and standard deviation.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn image_to_tensor(image: &DynamicImage, spec: &ModelSpec) -> Result<Array4<f32>> {
    let target_size = spec.input_size;
    let rgb_image = image.to_rgb8();
    let (orig_width, orig_height) = rgb_image.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Err(RemovalError::processing("Input image has zero dimensions"));
    }

    let target = target_size as f32;
    let scale = (target / orig_width as f32).min(target / orig_height as f32);
    let new_width = ((orig_width as f32) * scale).round().max(1.0) as u32;
    let new_height = ((orig_height as f32) * scale).round().max(1.0) as u32;

    let resized = image::imageops::resize(
        &rgb_image,
        new_width,
        new_height,
        image::imageops::FilterType::Triangle,
    );

    let mut canvas = ImageBuffer::from_pixel(target_size, target_size, image::Rgb(PADDING_COLOR));
    let offset_x = (target_size - new_width.min(target_size)) / 2;
    let offset_y = (target_size - new_height.min(target_size)) / 2;
    for (x, y, pixel) in resized.enumerate_pixels() {
        let canvas_x = x + offset_x;
        let canvas_y = y + offset_y;
        if canvas_x < target_size && canvas_y < target_size {
            canvas.put_pixel(canvas_x, canvas_y, *pixel);
        }
    }

    let size = target_size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for channel in 0..3 {
            let value = f32::from(pixel[channel]) / 255.0;
            tensor[[0, channel, y as usize, x as usize]] =
                (value - spec.mean[channel]) / spec.std[channel];
        }
    }

    Ok(tensor)
}

/// Convert the model's output tensor into a full-resolution alpha mask.
///
/// The matte is min-max normalized, mapped back through the inverse of the
/// preprocessing transform, and returned as one byte per original pixel in
/// row-major order.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn tensor_to_mask(tensor: &Array4<f32>, original_dimensions: (u32, u32)) -> Result<Vec<u8>> {
    let shape = tensor.shape();
    if shape.len() < 4 || shape[0] != 1 || shape[1] < 1 {
        return Err(RemovalError::processing("Invalid output tensor shape"));
    }
    let mask_height = shape[2] as u32;
    let mask_width = shape[3] as u32;
    let (orig_width, orig_height) = original_dimensions;

    // Min-max normalize the matte; U2Net-family outputs are not bounded to [0, 1]
    let matte = tensor.index_axis(ndarray::Axis(0), 0);
    let matte = matte.index_axis(ndarray::Axis(0), 0);
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &value in matte.iter() {
        min = min.min(value);
        max = max.max(value);
    }
    let range = (max - min).max(f32::EPSILON);

    // Reproduce the preprocessing math so mask coordinates invert exactly
    let target = mask_width as f32;
    let scale = (target / orig_width as f32).min(target / orig_height as f32);
    let scaled_width = ((orig_width as f32) * scale).round().max(1.0) as u32;
    let scaled_height = ((orig_height as f32) * scale).round().max(1.0) as u32;
    let transform = InverseTransform {
        scale,
        offset_x: (mask_width - scaled_width.min(mask_width)) / 2,
        offset_y: (mask_height - scaled_height.min(mask_height)) / 2,
        mask_width,
        mask_height,
    };

    let mut mask = Vec::with_capacity((orig_width * orig_height) as usize);
    for y in 0..orig_height {
        for x in 0..orig_width {
            let tensor_x = ((x as f32) * transform.scale).round() as u32 + transform.offset_x;
            let tensor_y = ((y as f32) * transform.scale).round() as u32 + transform.offset_y;
            let value = if tensor_x < transform.mask_width && tensor_y < transform.mask_height {
                matte
                    .get([tensor_y as usize, tensor_x as usize])
                    .copied()
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            let normalized = ((value - min) / range).clamp(0.0, 1.0);
            mask.push((normalized * 255.0) as u8);
        }
    }

    Ok(mask)
}

/// Smooth and denoise a predicted mask.
///
/// Mirrors the matte cleanup rembg applies when mask post-processing is
/// enabled: a 3x3 morphological opening, a 5x5 Gaussian blur, then a cutoff
/// that zeroes low-confidence pixels.
pub fn post_process_mask(mask: &[u8], width: u32, height: u32) -> Vec<u8> {
    let opened = dilate(&erode(mask, width, height), width, height);
    let blurred = gaussian_blur_5x5(&opened, width, height);
    blurred
        .into_iter()
        .map(|v| if v < MASK_CUTOFF { 0 } else { v })
        .collect()
}

/// Apply an alpha mask to the original image, producing the cut-out.
pub fn apply_mask(image: &DynamicImage, mask: &[u8]) -> RgbaImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut result = ImageBuffer::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = mask.get((y * width + x) as usize).copied().unwrap_or(0);
        if alpha > 0 {
            result.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], alpha]));
        } else {
            result.put_pixel(x, y, Rgba([0, 0, 0, 0]));
        }
    }

    result
}

fn erode(mask: &[u8], width: u32, height: u32) -> Vec<u8> {
    morph_3x3(mask, width, height, u8::min, u8::MAX)
}

fn dilate(mask: &[u8], width: u32, height: u32) -> Vec<u8> {
    morph_3x3(mask, width, height, u8::max, u8::MIN)
}

fn morph_3x3(
    mask: &[u8],
    width: u32,
    height: u32,
    fold: fn(u8, u8) -> u8,
    identity: u8,
) -> Vec<u8> {
    let (w, h) = (width as i64, height as i64);
    let mut out = vec![0u8; mask.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = identity;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx >= 0 && nx < w && ny >= 0 && ny < h {
                        acc = fold(acc, mask[(ny * w + nx) as usize]);
                    }
                }
            }
            out[(y * w + x) as usize] = acc;
        }
    }
    out
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn gaussian_blur_5x5(mask: &[u8], width: u32, height: u32) -> Vec<u8> {
    // Separable binomial kernel [1, 4, 6, 4, 1] / 16
    const KERNEL: [u32; 5] = [1, 4, 6, 4, 1];
    let (w, h) = (width as i64, height as i64);

    let mut horizontal = vec![0u8; mask.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            let mut weight = 0u32;
            for (i, k) in KERNEL.iter().enumerate() {
                let nx = x + i as i64 - 2;
                if nx >= 0 && nx < w {
                    sum += u32::from(mask[(y * w + nx) as usize]) * k;
                    weight += k;
                }
            }
            horizontal[(y * w + x) as usize] = (sum / weight.max(1)) as u8;
        }
    }

    let mut out = vec![0u8; mask.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            let mut weight = 0u32;
            for (i, k) in KERNEL.iter().enumerate() {
                let ny = y + i as i64 - 2;
                if ny >= 0 && ny < h {
                    sum += u32::from(horizontal[(ny * w + x) as usize]) * k;
                    weight += k;
                }
            }
            out[(y * w + x) as usize] = (sum / weight.max(1)) as u8;
        }
    }
    out
}
