//! Segmentation model catalog and subject-based selection
//!
//! The service runs the same ONNX models the upstream rembg project ships.
//! Each catalog entry carries the preprocessing parameters the model was
//! trained with, plus the release URL the file is fetched from on first use.

use crate::{
    config::SubjectHint,
    error::{RemovalError, Result},
};

/// Segmentation model for human subjects
pub const HUMAN_MODEL: &str = "u2net_human_seg";

/// General-purpose segmentation model
pub const GENERAL_MODEL: &str = "isnet-general-use";

/// Base URL for released model files
const MODEL_RELEASE_BASE: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

/// Static description of a segmentation model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    /// Model name, also the stem of the on-disk `.onnx` file
    pub name: &'static str,
    /// Square input edge length expected by the model
    pub input_size: u32,
    /// Per-channel normalization mean (RGB)
    pub mean: [f32; 3],
    /// Per-channel normalization standard deviation (RGB)
    pub std: [f32; 3],
}

impl ModelSpec {
    /// Download URL for this model's ONNX file
    #[must_use]
    pub fn download_url(&self) -> String {
        format!("{MODEL_RELEASE_BASE}/{}.onnx", self.name)
    }

    /// On-disk file name for this model
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.onnx", self.name)
    }
}

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Known models, keyed by rembg model name
const CATALOG: &[ModelSpec] = &[
    ModelSpec {
        name: "u2net",
        input_size: 320,
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    },
    ModelSpec {
        name: "u2netp",
        input_size: 320,
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    },
    ModelSpec {
        name: "u2net_human_seg",
        input_size: 320,
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    },
    ModelSpec {
        name: "isnet-general-use",
        input_size: 1024,
        mean: [0.5, 0.5, 0.5],
        std: [1.0, 1.0, 1.0],
    },
];

/// Look up a model spec by name.
///
/// # Errors
/// Returns a model error when the name is not in the catalog (e.g. a
/// misconfigured `BG_MODEL`).
pub fn lookup(name: &str) -> Result<&'static ModelSpec> {
    CATALOG
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| RemovalError::model(format!("Unknown segmentation model '{name}'")))
}

/// Map a subject hint to the model that should segment it.
///
/// `Person` always selects the human segmentation model; `Product` and
/// `General` select the general-purpose model; `Auto` defers to the
/// configured default. Pure and infallible.
#[must_use]
pub fn choose_model<'a>(subject: SubjectHint, default_model: &'a str) -> &'a str {
    match subject {
        SubjectHint::Person => HUMAN_MODEL,
        SubjectHint::Product | SubjectHint::General => GENERAL_MODEL,
        SubjectHint::Auto => default_model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_model_person() {
        assert_eq!(choose_model(SubjectHint::Person, "u2net"), HUMAN_MODEL);
    }

    #[test]
    fn test_choose_model_product_and_general() {
        assert_eq!(choose_model(SubjectHint::Product, "u2net"), GENERAL_MODEL);
        assert_eq!(choose_model(SubjectHint::General, "u2net"), GENERAL_MODEL);
    }

    #[test]
    fn test_choose_model_auto_uses_default() {
        assert_eq!(choose_model(SubjectHint::Auto, "u2netp"), "u2netp");
        // Garbage and empty subjects parse to Auto upstream
        assert_eq!(
            choose_model(SubjectHint::from_field("spaceship"), "u2net"),
            "u2net"
        );
        assert_eq!(choose_model(SubjectHint::from_field(""), "u2net"), "u2net");
    }

    #[test]
    fn test_lookup_known_models() {
        let isnet = lookup("isnet-general-use").unwrap();
        assert_eq!(isnet.input_size, 1024);
        assert_eq!(isnet.std, [1.0, 1.0, 1.0]);

        let human = lookup("u2net_human_seg").unwrap();
        assert_eq!(human.input_size, 320);
        assert_eq!(human.mean, IMAGENET_MEAN);
    }

    #[test]
    fn test_lookup_unknown_model() {
        assert!(lookup("sam-vit-h").is_err());
    }

    #[test]
    fn test_download_url() {
        let spec = lookup("u2net").unwrap();
        assert_eq!(
            spec.download_url(),
            "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx"
        );
        assert_eq!(spec.file_name(), "u2net.onnx");
    }
}
