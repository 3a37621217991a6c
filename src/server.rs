//! HTTP surface for the background removal service
//!
//! One POST endpoint drives the whole pipeline: parse the multipart form,
//! pick a model from the subject hint, segment, encode, persist, respond
//! with the artifact URL. Artifacts are served read-only under `/files/`.

use crate::{
    config::{self, OutputFormat, ServiceConfig, SubjectHint},
    download::ModelFetcher,
    encode,
    error::{RemovalError, Result},
    models,
    segmentation::{OnnxEngine, SegmentationEngine},
    storage::{ArtifactStore, FILES_PREFIX},
};
use actix_cors::Cors;
use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{get, post, web, App, HttpResponse, HttpServer};
use futures_util::TryStreamExt;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Engine name reported in the response envelope; kept stable for existing
/// clients of the service.
pub const ENGINE_NAME: &str = "rembg";

/// Shared per-process state, constructed once at startup
pub struct AppState {
    /// Startup configuration
    pub config: ServiceConfig,
    /// Artifact file store
    pub store: ArtifactStore,
    /// Segmentation collaborator
    pub engine: Arc<dyn SegmentationEngine>,
}

/// Success envelope for `POST /remove-background`
#[derive(Debug, Serialize)]
pub struct RemovalResponse<'a> {
    /// Always `true` on success
    pub ok: bool,
    /// Logical output format name
    pub format: &'a str,
    /// Public URL of the persisted artifact
    pub url: String,
    /// Segmentation engine identifier
    pub engine: &'a str,
    /// Model that performed the segmentation
    pub model: &'a str,
}

/// Parsed and defaulted form fields for a removal request
#[derive(Debug)]
struct RemovalForm {
    image: Vec<u8>,
    format: OutputFormat,
    quality: u8,
    subject: SubjectHint,
}

/// Register the service routes on an actix app
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(remove_background).service(health);
}

/// Read-only static file service over the storage root
pub fn static_files<P: Into<PathBuf>>(storage_root: P) -> Files {
    Files::new(&format!("/{FILES_PREFIX}"), storage_root)
}

#[post("/remove-background")]
async fn remove_background(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let form = parse_form(payload).await?;

    let model_name = models::choose_model(form.subject, &state.config.default_model);
    let spec = models::lookup(model_name)?;
    info!(
        model = model_name,
        format = form.format.as_str(),
        quality = form.quality,
        bytes = form.image.len(),
        "removing background"
    );

    let cutout = state
        .engine
        .remove_background(form.image, spec, state.config.execution_provider)
        .await?;

    // Encoding (AVIF in particular) is CPU-bound; keep it off the reactor
    let format = form.format;
    let quality = form.quality;
    let encoded = web::block(move || encode::encode_image(&cutout, format, quality))
        .await
        .map_err(|e| RemovalError::processing(format!("Encoding task failed: {e}")))??;

    let relative = state.store.store(&encoded, format.extension())?;
    let url = state.store.public_url(&state.config.base_url, &relative);
    info!(%url, "artifact persisted");

    Ok(HttpResponse::Ok().json(RemovalResponse {
        ok: true,
        format: format.as_str(),
        url,
        engine: ENGINE_NAME,
        model: model_name,
    }))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "ok": true }))
}

/// Collect and validate the multipart form fields.
///
/// Unknown fields are ignored. A missing or empty image body is the one
/// fixed-message client error; a non-numeric quality is rejected before the
/// pipeline runs.
async fn parse_form(mut payload: Multipart) -> Result<RemovalForm> {
    let mut image: Option<Vec<u8>> = None;
    let mut format = OutputFormat::default();
    let mut quality = config::DEFAULT_QUALITY;
    let mut subject = SubjectHint::default();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| RemovalError::invalid_field(format!("Malformed multipart payload: {e}")))?
    {
        let name = field.name().to_owned();
        let mut data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| RemovalError::invalid_field(format!("Malformed multipart payload: {e}")))?
        {
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "image" => image = Some(data),
            "format" => format = OutputFormat::from_field(text(&data).trim()),
            "quality" => {
                let value = text(&data);
                let value = value.trim();
                if !value.is_empty() {
                    let parsed: i64 = value.parse().map_err(|_| {
                        RemovalError::invalid_field("quality must be an integer")
                    })?;
                    quality = parsed;
                }
            },
            "subject" => subject = SubjectHint::from_field(text(&data).trim()),
            _ => {},
        }
    }

    let image = image.filter(|data| !data.is_empty()).ok_or(RemovalError::EmptyUpload)?;

    Ok(RemovalForm {
        image,
        format,
        quality: config::clamp_quality(quality),
        subject,
    })
}

fn text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Run the HTTP server until shutdown.
///
/// # Errors
/// Storage directory creation or socket bind failures.
pub async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let store = ArtifactStore::open(config.storage_dir.clone())?;
    let engine: Arc<dyn SegmentationEngine> =
        Arc::new(OnnxEngine::new(ModelFetcher::new(config.model_dir.clone())));
    let bind_addr = config.bind_addr.clone();
    let state = web::Data::new(AppState {
        config,
        store,
        engine,
    });

    info!(addr = %bind_addr, "background removal service listening");
    HttpServer::new(move || {
        let storage_root = state.config.storage_dir.clone();
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .configure(routes)
            .service(static_files(storage_root))
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
