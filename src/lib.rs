#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal Service
//!
//! An HTTP service that removes image backgrounds with ONNX Runtime
//! segmentation models. A client uploads an image, the service picks a model
//! from the declared subject category, strips the background, encodes the
//! cut-out into the requested format (PNG, JPEG, WebP or AVIF), persists it
//! under a random identifier and returns a retrievable URL.
//!
//! ## Request pipeline
//!
//! Each request runs a single linear pipeline with no state shared across
//! requests:
//!
//! ```text
//! receive -> select model -> segment -> encode -> persist -> respond
//! ```
//!
//! - [`models`] maps subject hints to segmentation models
//! - [`segmentation`] runs background removal behind an engine trait, one
//!   fresh ONNX session per request
//! - [`encode`] and [`storage`] produce and persist the output artifact
//! - [`server`] is the actix-web surface tying the steps together
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use bgremove_server::{config::ServiceConfig, server};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::from_env();
//! server::run(config).await
//! # }
//! ```
//!
//! Configuration comes from `BG_*` environment variables; every variable has
//! a default (see [`config::ServiceConfig::from_env`]).

pub mod config;
pub mod download;
pub mod encode;
pub mod error;
pub mod models;
pub mod segmentation;
pub mod server;
pub mod storage;

pub use config::{ExecutionProvider, OutputFormat, ServiceConfig, SubjectHint};
pub use error::{RemovalError, Result};
pub use segmentation::{OnnxEngine, SegmentationEngine};
pub use storage::ArtifactStore;
