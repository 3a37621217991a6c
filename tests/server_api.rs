//! Integration tests for the HTTP surface
//!
//! The segmentation engine is mocked so the tests exercise the request
//! pipeline (form parsing, model selection, encoding, persistence, response
//! envelope) without ONNX Runtime or model files.

use actix_web::{test, web, App};
use async_trait::async_trait;
use bgremove_server::{
    config::{ExecutionProvider, ServiceConfig},
    error::{RemovalError, Result},
    models::ModelSpec,
    segmentation::SegmentationEngine,
    server::{self, AppState},
    storage::ArtifactStore,
};
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BOUNDARY: &str = "test-boundary-7db3a1";

/// Engine double returning a fixed cut-out and counting invocations
struct MockEngine {
    calls: AtomicUsize,
}

impl MockEngine {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 4x4 cut-out: left half opaque blue, right half fully transparent
    fn cutout() -> RgbaImage {
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        for y in 0..4 {
            for x in 2..4 {
                image.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
        image
    }
}

#[async_trait]
impl SegmentationEngine for MockEngine {
    async fn remove_background(
        &self,
        image_bytes: Vec<u8>,
        _model: &'static ModelSpec,
        _provider: ExecutionProvider,
    ) -> Result<RgbaImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image_bytes.is_empty() {
            return Err(RemovalError::processing("engine received empty input"));
        }
        Ok(Self::cutout())
    }
}

fn test_state(storage_root: &std::path::Path, engine: Arc<MockEngine>) -> web::Data<AppState> {
    let config = ServiceConfig {
        storage_dir: storage_root.to_path_buf(),
        base_url: "http://127.0.0.1:8001/".to_string(),
        default_model: "isnet-general-use".to_string(),
        execution_provider: ExecutionProvider::Cpu,
        bind_addr: "127.0.0.1:0".to_string(),
        model_dir: storage_root.join("models"),
    };
    let store = ArtifactStore::open(storage_root.to_path_buf()).unwrap();
    web::Data::new(AppState {
        config,
        store,
        engine,
    })
}

/// Build a multipart/form-data body from (name, is_file, bytes) parts
fn multipart_body(parts: &[(&str, bool, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, is_file, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        if *is_file {
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"upload.png\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
        } else {
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_request(parts: &[(&str, bool, &[u8])]) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/remove-background")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(multipart_body(parts))
}

fn sample_upload() -> Vec<u8> {
    let image = RgbaImage::from_pixel(4, 4, Rgba([120, 80, 40, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .configure(server::routes)
                .service(server::static_files($state.config.storage_dir.clone())),
        )
        .await
    };
}

#[actix_web::test]
async fn health_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), Arc::new(MockEngine::new()));
    let app = init_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!({ "ok": true }));
}

#[actix_web::test]
async fn empty_upload_is_rejected_before_segmentation() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(MockEngine::new());
    let state = test_state(dir.path(), engine.clone());
    let app = init_app!(state);

    let resp =
        test::call_service(&app, post_request(&[("image", true, b"")]).to_request()).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Empty upload");
    assert_eq!(engine.calls(), 0);
}

#[actix_web::test]
async fn missing_image_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), Arc::new(MockEngine::new()));
    let app = init_app!(state);

    let resp = test::call_service(
        &app,
        post_request(&[("format", false, b"png")]).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn successful_removal_returns_envelope_and_persists_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), Arc::new(MockEngine::new()));
    let app = init_app!(state);

    let upload = sample_upload();
    let resp =
        test::call_service(&app, post_request(&[("image", true, &upload)]).to_request()).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["engine"], "rembg");
    assert_eq!(body["format"], "png");
    assert_eq!(body["model"], "isnet-general-use");

    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("http://127.0.0.1:8001/files/images/"));
    assert!(url.ends_with(".png"));

    let relative = url.strip_prefix("http://127.0.0.1:8001/files/").unwrap();
    assert!(dir.path().join(relative).is_file());
}

#[actix_web::test]
async fn jpg_output_has_jpg_extension_and_no_alpha() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), Arc::new(MockEngine::new()));
    let app = init_app!(state);

    let upload = sample_upload();
    let resp = test::call_service(
        &app,
        post_request(&[
            ("image", true, &upload),
            ("format", false, b"jpg"),
            ("quality", false, b"80"),
        ])
        .to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["format"], "jpeg");
    let url = body["url"].as_str().unwrap();
    assert!(url.ends_with(".jpg"));

    let relative = url.strip_prefix("http://127.0.0.1:8001/files/").unwrap();
    let stored = std::fs::read(dir.path().join(relative)).unwrap();
    let decoded = image::load_from_memory(&stored).unwrap();
    // The mock cut-out is half transparent; JPEG must flatten it away
    assert_eq!(decoded.color(), image::ColorType::Rgb8);
}

#[actix_web::test]
async fn unrecognized_format_falls_back_to_png_with_alpha() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), Arc::new(MockEngine::new()));
    let app = init_app!(state);

    let upload = sample_upload();
    let resp = test::call_service(
        &app,
        post_request(&[("image", true, &upload), ("format", false, b"bmp")]).to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["format"], "png");
    let url = body["url"].as_str().unwrap();
    assert!(url.ends_with(".png"));

    let relative = url.strip_prefix("http://127.0.0.1:8001/files/").unwrap();
    let stored = std::fs::read(dir.path().join(relative)).unwrap();
    let decoded = image::load_from_memory(&stored).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(3, 0).0[3], 0);
}

#[actix_web::test]
async fn subject_person_selects_human_model() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), Arc::new(MockEngine::new()));
    let app = init_app!(state);

    let upload = sample_upload();
    let resp = test::call_service(
        &app,
        post_request(&[("image", true, &upload), ("subject", false, b"Person")]).to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["model"], "u2net_human_seg");
}

#[actix_web::test]
async fn non_numeric_quality_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(MockEngine::new());
    let state = test_state(dir.path(), engine.clone());
    let app = init_app!(state);

    let upload = sample_upload();
    let resp = test::call_service(
        &app,
        post_request(&[("image", true, &upload), ("quality", false, b"high")]).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
    assert_eq!(engine.calls(), 0);
}

#[actix_web::test]
async fn repeated_requests_produce_distinct_retrievable_files() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), Arc::new(MockEngine::new()));
    let app = init_app!(state);

    let upload = sample_upload();
    let mut urls = Vec::new();
    for _ in 0..2 {
        let resp =
            test::call_service(&app, post_request(&[("image", true, &upload)]).to_request()).await;
        assert!(resp.status().is_success());
        let body: serde_json::Value = test::read_body_json(resp).await;
        urls.push(body["url"].as_str().unwrap().to_string());
    }
    assert_ne!(urls[0], urls[1]);

    // Each artifact is independently retrievable under /files/
    for url in &urls {
        let path = url.strip_prefix("http://127.0.0.1:8001").unwrap();
        let resp =
            test::call_service(&app, test::TestRequest::get().uri(path).to_request()).await;
        assert!(resp.status().is_success());
        let bytes = test::read_body(resp).await;
        assert!(!bytes.is_empty());
    }
}

#[actix_web::test]
async fn engine_failure_surfaces_as_500_with_detail() {
    struct FailingEngine;

    #[async_trait]
    impl SegmentationEngine for FailingEngine {
        async fn remove_background(
            &self,
            _image_bytes: Vec<u8>,
            _model: &'static ModelSpec,
            _provider: ExecutionProvider,
        ) -> Result<RgbaImage> {
            Err(RemovalError::inference("session exploded"))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        storage_dir: dir.path().to_path_buf(),
        base_url: "http://127.0.0.1:8001".to_string(),
        default_model: "isnet-general-use".to_string(),
        execution_provider: ExecutionProvider::Cpu,
        bind_addr: "127.0.0.1:0".to_string(),
        model_dir: dir.path().join("models"),
    };
    let state = web::Data::new(AppState {
        config,
        store: ArtifactStore::open(dir.path().to_path_buf()).unwrap(),
        engine: Arc::new(FailingEngine),
    });
    let app = init_app!(state);

    let upload = sample_upload();
    let resp =
        test::call_service(&app, post_request(&[("image", true, &upload)]).to_request()).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Failed to remove background:"));
    assert!(detail.contains("session exploded"));
}
