//! ONNX Runtime segmentation engine
//!
//! Production implementation of [`SegmentationEngine`]. Each call resolves
//! the model file (downloading it on first use), then builds a fresh ONNX
//! Runtime session on the blocking pool and runs the full
//! decode/preprocess/infer/postprocess pipeline. Sessions are deliberately
//! not cached: the service contract is one fresh session per request.

use crate::{
    config::ExecutionProvider,
    download::ModelFetcher,
    error::{RemovalError, Result},
    models::ModelSpec,
    segmentation::{preprocessing, SegmentationEngine},
};
use async_trait::async_trait;
use image::RgbaImage;
use ndarray::Array4;
use ort::execution_providers::{
    CUDA as CUDAExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use tracing::{debug, warn};

/// ONNX Runtime-backed segmentation engine
#[derive(Debug, Clone)]
pub struct OnnxEngine {
    fetcher: ModelFetcher,
}

impl OnnxEngine {
    /// Create an engine that resolves model files through the given fetcher
    #[must_use]
    pub fn new(fetcher: ModelFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl SegmentationEngine for OnnxEngine {
    async fn remove_background(
        &self,
        image_bytes: Vec<u8>,
        model: &'static ModelSpec,
        provider: ExecutionProvider,
    ) -> Result<RgbaImage> {
        let model_path = self.fetcher.ensure(model).await?;

        // ort sessions are synchronous; keep inference off the reactor
        tokio::task::spawn_blocking(move || segment(&model_path, model, provider, &image_bytes))
            .await
            .map_err(|e| RemovalError::processing(format!("Inference task panicked: {e}")))?
    }
}

/// Run the full segmentation pipeline for one request
fn segment(
    model_path: &Path,
    spec: &ModelSpec,
    provider: ExecutionProvider,
    image_bytes: &[u8],
) -> Result<RgbaImage> {
    let image = image::load_from_memory(image_bytes)?;
    let original_dimensions = (image.width(), image.height());
    debug!(
        model = spec.name,
        width = original_dimensions.0,
        height = original_dimensions.1,
        "starting segmentation"
    );

    let input = preprocessing::image_to_tensor(&image, spec)?;
    let mut session = open_session(model_path, provider)?;
    let output = run_inference(&mut session, &input)?;

    let mask = preprocessing::tensor_to_mask(&output, original_dimensions)?;
    let mask = preprocessing::post_process_mask(&mask, original_dimensions.0, original_dimensions.1);
    Ok(preprocessing::apply_mask(&image, &mask))
}

/// Build a fresh inference session for the given model file and provider
fn open_session(model_path: &Path, provider: ExecutionProvider) -> Result<Session> {
    let builder = Session::builder()
        .map_err(|e| RemovalError::inference(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| RemovalError::inference(format!("Failed to set optimization level: {e}")))?;

    let builder = match provider {
        ExecutionProvider::Cpu => builder,
        ExecutionProvider::Cuda => {
            let cuda = CUDAExecutionProvider::default();
            if OrtExecutionProvider::is_available(&cuda).unwrap_or(false) {
                builder
                    .with_execution_providers([cuda.build()])
                    .map_err(|e| {
                        RemovalError::inference(format!("Failed to set CUDA provider: {e}"))
                    })?
            } else {
                warn!("CUDA execution provider requested but not available, falling back to CPU");
                builder
            }
        },
    };

    let intra_threads = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1);

    builder
        .with_intra_threads(intra_threads)
        .map_err(|e| RemovalError::inference(format!("Failed to set intra-op threads: {e}")))?
        .commit_from_file(model_path)
        .map_err(|e| {
            RemovalError::model(format!(
                "Failed to load model '{}': {e}",
                model_path.display()
            ))
        })
}

/// Run inference and extract the first output as a 4D tensor
fn run_inference(session: &mut Session, input: &Array4<f32>) -> Result<Array4<f32>> {
    let input_value = Value::from_array(input.clone())
        .map_err(|e| RemovalError::inference(format!("Failed to convert input tensor: {e}")))?;

    let outputs = session
        .run(ort::inputs![input_value])
        .map_err(|e| RemovalError::inference(format!("ONNX inference failed: {e}")))?;

    // Positional output access; model output names vary across the catalog
    let keys: Vec<_> = outputs.keys().collect();
    let first_key = keys
        .first()
        .ok_or_else(|| RemovalError::inference("No output tensors found"))?;
    let output = outputs
        .get(first_key)
        .ok_or_else(|| RemovalError::inference("First output tensor not found"))?
        .try_extract_array::<f32>()
        .map_err(|e| RemovalError::inference(format!("Failed to extract output tensor: {e}")))?;

    let shape = output.shape().to_vec();
    if shape.len() != 4 {
        return Err(RemovalError::inference(format!(
            "Expected 4D output tensor, got {}D",
            shape.len()
        )));
    }

    Array4::from_shape_vec(
        (shape[0], shape[1], shape[2], shape[3]),
        output.view().to_owned().into_raw_vec_and_offset().0,
    )
    .map_err(|e| RemovalError::inference(format!("Failed to reshape output tensor: {e}")))
}
