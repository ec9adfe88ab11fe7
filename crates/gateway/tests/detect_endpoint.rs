//! End-to-end tests for `POST /detect` and the static result route.
//!
//! A fake detector stands in for the model so the file-handling contract can be
//! checked without weights on disk.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use gateway::{AppState, DetectResponse, create_app};
use image::{ImageFormat, Rgb, RgbImage};
use inference::{Annotation, Detector, ResultStore};
use serde_json::Value;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::util::ServiceExt;

const BOUNDARY: &str = "detect-test-boundary";

#[derive(Clone, Copy)]
enum Behaviour {
    Render,
    Nothing,
    Fail,
}

/// Records how many files the output directory held each time it was called.
struct FakeDetector {
    behaviour: Behaviour,
    output_dir: PathBuf,
    seen_output_files: Arc<Mutex<Vec<usize>>>,
}

impl Detector for FakeDetector {
    fn annotate(&mut self, image: &RgbImage) -> anyhow::Result<Option<Annotation>> {
        let files = fs::read_dir(&self.output_dir)?.count();
        self.seen_output_files.lock().unwrap().push(files);

        match self.behaviour {
            Behaviour::Render => Ok(Some(Annotation {
                image: image.clone(),
                detections: Vec::new(),
            })),
            Behaviour::Nothing => Ok(None),
            Behaviour::Fail => anyhow::bail!("weights are corrupt"),
        }
    }
}

struct TestApp {
    router: Router,
    static_dir: TempDir,
    scratch_dir: TempDir,
    seen_output_files: Arc<Mutex<Vec<usize>>>,
}

impl TestApp {
    fn new(behaviour: Behaviour) -> Self {
        Self::with_upload_limit(behaviour, 10 * 1024 * 1024)
    }

    fn with_upload_limit(behaviour: Behaviour, max_upload_bytes: usize) -> Self {
        let static_dir = tempfile::tempdir().unwrap();
        let scratch_dir = tempfile::tempdir().unwrap();
        let seen_output_files = Arc::new(Mutex::new(Vec::new()));

        let detector = FakeDetector {
            behaviour,
            output_dir: static_dir.path().to_path_buf(),
            seen_output_files: seen_output_files.clone(),
        };

        let state = AppState::new(
            Box::new(detector),
            ResultStore::new(static_dir.path()),
            scratch_dir.path().to_path_buf(),
            max_upload_bytes,
        );

        Self {
            router: create_app(state),
            static_dir,
            scratch_dir,
            seen_output_files,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn detect(&self, file_name: &str) -> (StatusCode, Value) {
        self.detect_bytes(file_name, &png_bytes()).await
    }

    async fn detect_bytes(&self, file_name: &str, content: &[u8]) -> (StatusCode, Value) {
        let (status, body) = self
            .send(multipart_request("image", file_name, content))
            .await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn static_files(&self) -> Vec<String> {
        list_files(self.static_dir.path())
    }

    fn scratch_entries(&self) -> usize {
        fs::read_dir(self.scratch_dir.path()).unwrap().count()
    }
}

fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn encoded(format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_pixel(32, 24, Rgb([40, 120, 200]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

fn png_bytes() -> Vec<u8> {
    encoded(ImageFormat::Png)
}

fn multipart_request(field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_detect_returns_path_of_existing_result() {
    let app = TestApp::new(Behaviour::Render);

    let (status, body) = app.detect("parking_lot.png").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "static/parking_lot_result.jpg");

    let response: DetectResponse = serde_json::from_value(body).unwrap();
    let file_name = response.result.strip_prefix("static/").unwrap();
    assert!(app.static_dir.path().join(file_name).exists());
}

#[tokio::test]
async fn test_scratch_upload_is_removed_after_request() {
    let app = TestApp::new(Behaviour::Render);

    let (status, _) = app.detect("lot.png").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.scratch_entries(), 0, "scratch upload must not outlive the request");
    assert_eq!(app.static_files(), vec!["lot_result.jpg"], "upload never lands in the output dir");
}

#[tokio::test]
async fn test_output_directory_is_cleared_before_detection() {
    let app = TestApp::new(Behaviour::Render);
    fs::write(app.static_dir.path().join("stale.jpg"), b"old").unwrap();
    fs::write(app.static_dir.path().join("notes.txt"), b"old").unwrap();

    let (status, _) = app.detect("first.png").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.detect("second.png").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(*app.seen_output_files.lock().unwrap(), vec![0, 0]);
}

#[tokio::test]
async fn test_sequential_uploads_keep_only_latest_result() {
    let app = TestApp::new(Behaviour::Render);

    let (_, first) = app.detect("first.png").await;
    assert_eq!(first["result"], "static/first_result.jpg");
    assert_eq!(app.static_files(), vec!["first_result.jpg"]);

    let (_, second) = app.detect("second.jpeg").await;
    assert_eq!(second["result"], "static/second_result.jpg");
    assert_eq!(app.static_files(), vec!["second_result.jpg"]);
}

#[tokio::test]
async fn test_no_rendering_is_reported_as_unprocessable() {
    let app = TestApp::new(Behaviour::Nothing);

    let (status, body) = app.detect("empty.png").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("no annotated image"));
    assert!(body.get("result").is_none(), "never answers with static/None");
    assert!(app.static_files().is_empty());
    assert_eq!(app.scratch_entries(), 0);
}

#[tokio::test]
async fn test_detector_failure_is_a_server_error_and_cleans_up() {
    let app = TestApp::new(Behaviour::Fail);

    let (status, body) = app.detect("lot.png").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("weights are corrupt"));
    assert_eq!(app.scratch_entries(), 0, "upload is deleted even when inference fails");
}

#[tokio::test]
async fn test_upload_format_is_taken_from_content() {
    let app = TestApp::new(Behaviour::Render);

    for (file_name, expected) in [
        ("lot.jpg", "static/lot_result.jpg"),
        ("lot", "static/lot_result.jpg"),
        ("blob", "static/blob_result.jpg"),
    ] {
        let (status, body) = app.detect_bytes(file_name, &png_bytes()).await;

        assert_eq!(status, StatusCode::OK, "{file_name}");
        assert_eq!(body["result"], expected, "{file_name}");
    }
    assert_eq!(app.static_files(), vec!["blob_result.jpg"]);
}

#[tokio::test]
async fn test_jpeg_and_webp_uploads_are_annotated() {
    let app = TestApp::new(Behaviour::Render);

    let (status, body) = app
        .detect_bytes("camera.jpeg", &encoded(ImageFormat::Jpeg))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "static/camera_result.jpg");

    let (status, body) = app
        .detect_bytes("phone.webp", &encoded(ImageFormat::WebP))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "static/phone_result.jpg");
    assert_eq!(app.static_files(), vec!["phone_result.jpg"]);
}

#[tokio::test]
async fn test_undecodable_upload_is_a_server_error() {
    let app = TestApp::new(Behaviour::Render);

    let (status, _) = app
        .send(multipart_request("image", "lot.png", b"not an image"))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.scratch_entries(), 0);
}

#[tokio::test]
async fn test_missing_image_field_is_rejected() {
    let app = TestApp::new(Behaviour::Render);

    let (status, body) = app
        .send(multipart_request("file", "lot.png", &png_bytes()))
        .await;
    let body: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("image"));
    assert!(app.seen_output_files.lock().unwrap().is_empty(), "detector never ran");
}

#[tokio::test]
async fn test_client_path_components_are_stripped() {
    let app = TestApp::new(Behaviour::Render);

    let (status, body) = app.detect("../../escape.png").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "static/escape_result.jpg");
    assert_eq!(app.scratch_entries(), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = TestApp::with_upload_limit(Behaviour::Render, 64);

    let (status, _) = app
        .send(multipart_request("image", "lot.png", &vec![0u8; 4096]))
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.seen_output_files.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_result_is_served_from_static_route() {
    let app = TestApp::new(Behaviour::Render);
    let (_, body) = app.detect("lot.png").await;
    let result = body["result"].as_str().unwrap().to_string();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/{}", result))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let served = image::load_from_memory(&bytes).unwrap();
    assert_eq!((served.width(), served.height()), (32, 24));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = TestApp::new(Behaviour::Render);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/detect")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(Behaviour::Render);

    let (status, body) = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    let body: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

/// Concurrent uploads are serialised, so only completion and the
/// single-survivor property are asserted; which result survives is not.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_uploads_leave_a_single_result() {
    let app = TestApp::new(Behaviour::Render);

    let (a, b) = tokio::join!(app.detect("north.png"), app.detect("south.png"));

    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);

    let files = app.static_files();
    assert_eq!(files.len(), 1, "got {:?}", files);
    assert!(files[0] == "north_result.jpg" || files[0] == "south_result.jpg");
    assert_eq!(app.scratch_entries(), 0);
}
