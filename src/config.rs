//! Configuration types for the background removal service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        Self::Cpu
    }
}

impl ExecutionProvider {
    /// Parse a device selector string.
    ///
    /// `"cpu"` (case-insensitive) selects the CPU provider; any other value
    /// selects CUDA, mirroring the upstream service's device switch.
    #[must_use]
    pub fn from_device(device: &str) -> Self {
        if device.eq_ignore_ascii_case("cpu") {
            Self::Cpu
        } else {
            Self::Cuda
        }
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency (lossless)
    Png,
    /// JPEG (no transparency, alpha flattened away)
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
    /// AVIF with alpha channel transparency
    Avif,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl OutputFormat {
    /// Parse a caller-supplied format field.
    ///
    /// Matching is case-insensitive; `jpg` and `jpeg` are synonyms. Any
    /// unrecognized value (including empty) silently falls back to PNG.
    #[must_use]
    pub fn from_field(field: &str) -> Self {
        match field.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "webp" => Self::WebP,
            "avif" => Self::Avif,
            _ => Self::Png,
        }
    }

    /// File extension for artifacts in this format (without the dot)
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }

    /// Logical format name reported in the response envelope
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }

    /// Whether the format keeps the alpha channel
    #[must_use]
    pub fn supports_transparency(self) -> bool {
        match self {
            Self::Png | Self::WebP | Self::Avif => true,
            Self::Jpeg => false,
        }
    }
}

/// Subject hint used to pick the segmentation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectHint {
    /// Human subject
    Person,
    /// Product shot
    Product,
    /// General-purpose subject
    General,
    /// No preference; use the configured default model
    Auto,
}

impl Default for SubjectHint {
    fn default() -> Self {
        Self::Auto
    }
}

impl SubjectHint {
    /// Parse a caller-supplied subject field.
    ///
    /// Matching is case-insensitive; anything unrecognized (including empty)
    /// is treated as `Auto`.
    #[must_use]
    pub fn from_field(field: &str) -> Self {
        match field.to_ascii_lowercase().as_str() {
            "person" => Self::Person,
            "product" => Self::Product,
            "general" => Self::General,
            _ => Self::Auto,
        }
    }
}

/// Default quality applied when the form omits the field
pub const DEFAULT_QUALITY: i64 = 95;

/// Clamp a caller-supplied quality value to the valid encoder range [1, 100].
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_quality(quality: i64) -> u8 {
    quality.clamp(1, 100) as u8
}

/// Service configuration, resolved once at startup from the environment and
/// passed into handlers by reference via app state.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Filesystem root for persisted artifacts
    pub storage_dir: PathBuf,
    /// Public base URL used to build returned links
    pub base_url: String,
    /// Default segmentation model name
    pub default_model: String,
    /// Compute backend for inference sessions
    pub execution_provider: ExecutionProvider,
    /// Listen address for the HTTP server
    pub bind_addr: String,
    /// Directory holding downloaded model files
    pub model_dir: PathBuf,
}

impl ServiceConfig {
    /// Build the configuration from environment variables.
    ///
    /// Every variable has a default; absence of any is not an error.
    #[must_use]
    pub fn from_env() -> Self {
        let storage_dir = env_or("BG_STORAGE_DIR", "./storage").into();
        let base_url = env_or("BG_BASE_URL", "http://127.0.0.1:8001");
        let default_model = env_or("BG_MODEL", "isnet-general-use");
        let execution_provider = ExecutionProvider::from_device(&env_or("BG_DEVICE", "cpu"));
        let bind_addr = env_or("BG_BIND", "127.0.0.1:8001");
        let model_dir =
            std::env::var("BG_MODEL_DIR").map_or_else(|_| default_model_dir(), PathBuf::from);

        Self {
            storage_dir,
            base_url,
            default_model,
            execution_provider,
            bind_addr,
            model_dir,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn default_model_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bgremove-server")
        .join("models")
}
