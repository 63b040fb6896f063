//! Integration tests for the web front-end
//!
//! Tests cover:
//! - Landing page rendering
//! - Multipart uploads, including the missing-field and empty-filename paths
//! - Base64 recordings, as data URLs and as bare payloads
//! - Error bodies for corrupt input
//! - Scratch file cleanup
//! - Health endpoint and request counting

use std::f32::consts::PI;
use std::io::Cursor;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine;
use candle_core::Device;
use hound::{SampleFormat, WavSpec, WavWriter};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use wildear::server::{create_router, AppState};
use wildear::{AppConfig, FeatureConfig, Predictor};

const BOUNDARY: &str = "wildear-test-boundary";

const TEST_SPECIES: &[&str] = &[
    "Alcedo_atthis",
    "Ardea_purpurea",
    "Botaurus_stellaris",
    "Fulica_atra",
    "Ixobrychus_minutus",
];

/// Test helper: router over a temp uploads dir and random weights.
/// The TempDir must stay alive for the duration of the test.
fn test_router(keep_uploads: bool) -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();

    let labels_path = dir.path().join("labels.json");
    std::fs::write(&labels_path, serde_json::to_string(TEST_SPECIES).unwrap()).unwrap();

    let config = AppConfig {
        uploads_dir: dir.path().join("uploads"),
        keep_uploads,
        features: FeatureConfig {
            clip_seconds: 1.0,
            ..FeatureConfig::default()
        },
        ..AppConfig::default()
    };

    let predictor = Predictor::from_files(
        dir.path().join("absent.safetensors"),
        &labels_path,
        config.features.clone(),
        &Device::Cpu,
    )
    .unwrap();

    let state = std::sync::Arc::new(AppState::new(config, predictor));
    (dir, create_router(state))
}

/// Test helper: one second of 16-bit PCM WAV.
fn wav_bytes() -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..22_050 {
            let t = i as f32 / 22_050.0;
            let sample = (2.0 * PI * 440.0 * t).sin();
            writer
                .write_sample((sample * i16::MAX as f32 * 0.6) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Test helper: multipart form body with a single field.
fn multipart_request(field_name: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field_name, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Test helper: JSON POST to /record.
fn record_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/record")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Landing page
// =============================================================================

#[tokio::test]
async fn test_index_page_renders() {
    let (_dir, app) = test_router(false);

    let request = Request::builder()
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response.into_body()).await;
    assert!(page.contains("multipart/form-data"));
    assert!(page.contains("name=\"file\""));
    assert!(page.contains("id=\"result\""));
    assert!(!page.contains("Predicted Species"));
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, app) = test_router(false);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["species"], TEST_SPECIES.len());
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_health_reports_served_requests() {
    let (_dir, app) = test_router(false);

    // A rejected recording still counts as a served request.
    let response = app
        .clone()
        .oneshot(record_request(json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = body_json(response.into_body()).await;
    assert_eq!(body["requests_served"], 1);
}

// =============================================================================
// Multipart uploads
// =============================================================================

#[tokio::test]
async fn test_upload_predicts_species() {
    let (_dir, app) = test_router(false);

    let request = multipart_request("file", "clip.wav", &wav_bytes());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response.into_body()).await;
    assert!(page.contains("Predicted Species: "));
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let (_dir, app) = test_router(false);

    let request = multipart_request("attachment", "clip.wav", &wav_bytes());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response.into_body()).await;
    assert!(page.contains("No file part in request."));
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let (_dir, app) = test_router(false);

    let request = multipart_request("file", "", &wav_bytes());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response.into_body()).await;
    assert!(page.contains("No file selected."));
}

#[tokio::test]
async fn test_upload_corrupt_file_reports_decode_error() {
    let (_dir, app) = test_router(false);

    let request = multipart_request("file", "noise.wav", b"definitely not a RIFF container");
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response.into_body()).await;
    assert!(page.contains("Could not decode the audio file."));
}

#[tokio::test]
async fn test_upload_scratch_is_cleaned_up() {
    let (dir, app) = test_router(false);

    let request = multipart_request("file", "clip.wav", &wav_bytes());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let uploads = dir.path().join("uploads");
    let remaining: Vec<_> = std::fs::read_dir(&uploads).unwrap().collect();
    assert!(remaining.is_empty(), "scratch files were left behind");
}

#[tokio::test]
async fn test_upload_filename_is_sanitized() {
    let (dir, app) = test_router(true);

    let request = multipart_request("file", "../../escape.wav", &wav_bytes());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Only the final path component is used, inside the uploads dir.
    assert!(dir.path().join("uploads/escape.wav").exists());
    assert!(!dir.path().join("escape.wav").exists());
}

// =============================================================================
// Recordings
// =============================================================================

#[tokio::test]
async fn test_record_without_audio_field() {
    let (_dir, app) = test_router(false);

    let response = app.oneshot(record_request(json!({}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"], "No audio data received");
}

#[tokio::test]
async fn test_record_with_empty_audio_field() {
    let (_dir, app) = test_router(false);

    let response = app
        .oneshot(record_request(json!({ "audio": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"], "No audio data received");
}

#[tokio::test]
async fn test_record_with_malformed_json() {
    let (_dir, app) = test_router(false);

    let request = Request::builder()
        .method("POST")
        .uri("/record")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_record_data_url() {
    let (_dir, app) = test_router(false);

    let encoded = base64::engine::general_purpose::STANDARD.encode(wav_bytes());
    let audio = format!("data:audio/wav;base64,{}", encoded);
    let response = app
        .oneshot(record_request(json!({ "audio": audio })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert!(body["prediction"]
        .as_str()
        .unwrap()
        .starts_with("Predicted Species: "));
}

#[tokio::test]
async fn test_record_bare_base64_matches_data_url() {
    let (_dir, app) = test_router(false);

    let encoded = base64::engine::general_purpose::STANDARD.encode(wav_bytes());

    let response = app
        .clone()
        .oneshot(record_request(json!({ "audio": encoded })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bare = body_json(response.into_body()).await;

    let audio = format!("data:audio/wav;base64,{}", encoded);
    let response = app
        .oneshot(record_request(json!({ "audio": audio })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let data_url = body_json(response.into_body()).await;

    assert_eq!(bare["prediction"], data_url["prediction"]);
}

#[tokio::test]
async fn test_record_invalid_base64() {
    let (_dir, app) = test_router(false);

    let response = app
        .oneshot(record_request(
            json!({ "audio": "data:audio/wav;base64,!!!not-base64!!!" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"], "Could not decode the audio data");
}

#[tokio::test]
async fn test_record_undecodable_audio() {
    let (_dir, app) = test_router(false);

    let encoded = base64::engine::general_purpose::STANDARD.encode(b"static hiss, not a container");
    let audio = format!("data:audio/webm;base64,{}", encoded);
    let response = app
        .clone()
        .oneshot(record_request(json!({ "audio": audio })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"], "Could not decode the audio data");

    // A failed prediction must not wedge the service.
    let good = base64::engine::general_purpose::STANDARD.encode(wav_bytes());
    let audio = format!("data:audio/wav;base64,{}", good);
    let response = app
        .oneshot(record_request(json!({ "audio": audio })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_record_mislabeled_mime_still_decodes() {
    let (_dir, app) = test_router(false);

    // Browsers that ignore the recorder's WAV re-encode still send webm mime.
    let encoded = base64::engine::general_purpose::STANDARD.encode(wav_bytes());
    let audio = format!("data:audio/webm;codecs=opus;base64,{}", encoded);
    let response = app
        .oneshot(record_request(json!({ "audio": audio })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_record_scratch_is_cleaned_up() {
    let (dir, app) = test_router(false);

    let encoded = base64::engine::general_purpose::STANDARD.encode(wav_bytes());
    let audio = format!("data:audio/wav;base64,{}", encoded);
    let response = app
        .oneshot(record_request(json!({ "audio": audio })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let uploads = dir.path().join("uploads");
    let remaining: Vec<_> = std::fs::read_dir(&uploads).unwrap().collect();
    assert!(remaining.is_empty(), "scratch files were left behind");
}

#[tokio::test]
async fn test_record_keep_uploads_preserves_scratch() {
    let (dir, app) = test_router(true);

    let encoded = base64::engine::general_purpose::STANDARD.encode(wav_bytes());
    let audio = format!("data:audio/wav;base64,{}", encoded);
    let response = app
        .oneshot(record_request(json!({ "audio": audio })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let uploads = dir.path().join("uploads");
    let remaining: Vec<_> = std::fs::read_dir(&uploads).unwrap().collect();
    assert_eq!(remaining.len(), 1);
}
