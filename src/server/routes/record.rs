//! Browser recording route

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use chrono::Local;
use tracing::{debug, error};
use uuid::Uuid;

use crate::server::routes::run_prediction;
use crate::server::state::AppState;
use crate::server::types::{ErrorBody, RecordRequest, RecordResponse};

/// Pick a storage extension from the mime type embedded in the data URL.
/// The in-page recorder re-encodes to WAV, so WAV is also the fallback for
/// bare base64 payloads.
fn extension_for(audio: &str) -> &'static str {
    if audio.contains("audio/wav") || audio.contains("audio/wave") {
        ".wav"
    } else if audio.contains("audio/webm") {
        ".webm"
    } else if audio.contains("audio/ogg") {
        ".ogg"
    } else if audio.contains("audio/mp4") {
        ".m4a"
    } else {
        ".wav"
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn server_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Handle a base64 recording posted by the page's recorder script.
///
/// The payload is stored as a scratch file (extension from the data URL mime
/// type) and run through the prediction pipeline. Clients only ever see a
/// generic error string; the full error chain goes to the server log.
pub async fn record(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<RecordRequest>>,
) -> Response {
    state.count_request();

    let audio = match payload.and_then(|Json(r)| r.audio) {
        Some(audio) if !audio.is_empty() => audio,
        _ => return bad_request("No audio data received"),
    };

    let ext = extension_for(&audio);

    // Strip the data URL prefix, keeping the payload after the first comma.
    let payload_b64 = match audio.split_once(',') {
        Some((_, rest)) => rest,
        None => audio.as_str(),
    };

    // Recorders occasionally wrap base64 lines; whitespace is not payload.
    let cleaned: String = payload_b64
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = match base64::engine::general_purpose::STANDARD.decode(cleaned.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Recording payload is not valid base64");
            return bad_request("Could not decode the audio data");
        }
    };

    if let Err(e) = state.ensure_uploads_dir() {
        error!(error = %e, "Cannot create uploads directory");
        return server_error("Could not store the recording");
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let unique = Uuid::new_v4().simple().to_string();
    let filename = format!("recording_{}_{}{}", timestamp, &unique[..8], ext);
    let path = state.scratch_path(&filename);

    if let Err(e) = tokio::fs::write(&path, &bytes).await {
        error!(error = %e, path = %path.display(), "Failed to store recording");
        return server_error("Could not store the recording");
    }

    debug!(filename = %filename, bytes = bytes.len(), "Stored recorded clip");

    let result = run_prediction(&state, path.clone()).await;
    state.cleanup_scratch(&path);

    match result {
        Ok(prediction) => (
            StatusCode::OK,
            Json(RecordResponse {
                success: true,
                prediction: prediction.display_text(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, filename = %filename, "Recording prediction failed");
            if e.is_input_error() {
                bad_request("Could not decode the audio data")
            } else {
                server_error("Prediction failed")
            }
        }
    }
}
