//! Segmentation engine abstraction
//!
//! The service treats segmentation as an opaque collaborator behind the
//! [`SegmentationEngine`] trait: raw upload bytes in, RGBA cut-out with a
//! transparent background out. The production implementation runs ONNX
//! Runtime; tests substitute a mock.

pub mod onnx;
pub mod preprocessing;

pub use onnx::OnnxEngine;

use crate::{config::ExecutionProvider, error::Result, models::ModelSpec};
use async_trait::async_trait;
use image::RgbaImage;

/// Engine that strips the background from an uploaded image.
///
/// Implementations build a fresh inference session per call; there is no
/// session reuse or pooling, so every request pays the full model-load cost.
#[async_trait]
pub trait SegmentationEngine: Send + Sync {
    /// Remove the background from `image_bytes` using the given model.
    ///
    /// # Errors
    /// Any failure (undecodable input, model load, inference) surfaces as a
    /// processing error; callers do not discriminate between causes.
    async fn remove_background(
        &self,
        image_bytes: Vec<u8>,
        model: &'static ModelSpec,
        provider: ExecutionProvider,
    ) -> Result<RgbaImage>;
}
