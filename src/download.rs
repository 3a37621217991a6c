//! Model downloading into the local model directory
//!
//! Model files are fetched on first use from the rembg release URLs and kept
//! under the configured model directory. Downloads stream to a uniquely named
//! `.part` file and are renamed into place, so a partially fetched model is
//! never mistaken for a complete one and concurrent first requests for the
//! same model never write through each other's download.

use crate::{
    error::{RemovalError, Result},
    models::ModelSpec,
};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

/// Resolves model names to local ONNX files, downloading when absent
#[derive(Debug, Clone)]
pub struct ModelFetcher {
    client: Client,
    model_dir: PathBuf,
}

impl ModelFetcher {
    /// Create a fetcher rooted at the given model directory
    #[must_use]
    pub fn new<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            client: Client::new(),
            model_dir: model_dir.into(),
        }
    }

    /// Directory the fetcher stores model files in
    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Return the local path for a model, downloading the file if needed.
    ///
    /// # Errors
    /// - Model directory cannot be created
    /// - Download request fails or returns a non-success status
    /// - File I/O errors while writing the model file
    pub async fn ensure(&self, spec: &ModelSpec) -> Result<PathBuf> {
        let path = self.model_dir.join(spec.file_name());
        if path.exists() {
            debug!(model = spec.name, path = %path.display(), "model already cached");
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.model_dir).await?;
        let url = spec.download_url();
        info!(model = spec.name, %url, "downloading segmentation model");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RemovalError::model(format!("Failed to request model '{url}': {e}")))?;

        if !response.status().is_success() {
            return Err(RemovalError::model(format!(
                "Model download '{url}' returned HTTP {}",
                response.status()
            )));
        }

        // Each download gets its own scratch file; with concurrent fetches of
        // the same model the last rename wins and installs a complete file.
        let part_path = self.part_path(spec);
        let mut file = tokio::fs::File::create(&part_path).await?;
        let mut response = response;
        let mut downloaded: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| RemovalError::model(format!("Model download interrupted: {e}")))?
        {
            downloaded += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&part_path, &path).await?;
        info!(
            model = spec.name,
            bytes = downloaded,
            path = %path.display(),
            "model downloaded"
        );
        Ok(path)
    }

    /// Scratch path for an in-flight download, unique per call
    fn part_path(&self, spec: &ModelSpec) -> PathBuf {
        self.model_dir
            .join(format!("{}.{}.part", spec.file_name(), Uuid::new_v4().simple()))
    }
}
