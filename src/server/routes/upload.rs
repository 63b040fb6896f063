//! File upload route

use std::path::Path;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::Html;
use tracing::{debug, error};

use crate::server::page::render_index;
use crate::server::routes::run_prediction;
use crate::server::state::AppState;

/// Handle a multipart upload from the page's form and render the page again
/// with the prediction (or a message) in the result line.
///
/// The form field must be named `file`. Responses are always the HTML page;
/// problems with the submission become messages in the result line rather
/// than error status codes, matching what the form flow expects.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Html<String> {
    state.count_request();

    let field = loop {
        match multipart.next_field().await {
            Ok(Some(f)) if f.name() == Some("file") => break f,
            Ok(Some(_)) => continue,
            Ok(None) => return render_index("No file part in request."),
            Err(e) => {
                error!(error = %e, "Malformed multipart request");
                return render_index("No file part in request.");
            }
        }
    };

    let client_name = field.file_name().unwrap_or("").to_string();
    if client_name.is_empty() {
        return render_index("No file selected.");
    }

    let data = match field.bytes().await {
        Ok(data) => data,
        Err(e) => {
            error!(error = %e, "Failed to read uploaded file");
            return render_index("Could not read the uploaded file.");
        }
    };

    // Store under the client's file name, but only its final component.
    let filename = Path::new(&client_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    if let Err(e) = state.ensure_uploads_dir() {
        error!(error = %e, "Cannot create uploads directory");
        return render_index("Could not store the uploaded file.");
    }

    let path = state.scratch_path(&filename);
    if let Err(e) = tokio::fs::write(&path, &data).await {
        error!(error = %e, path = %path.display(), "Failed to store upload");
        return render_index("Could not store the uploaded file.");
    }

    debug!(filename = %filename, bytes = data.len(), "Stored uploaded clip");

    let result = run_prediction(&state, path.clone()).await;
    state.cleanup_scratch(&path);

    match result {
        Ok(prediction) => render_index(&prediction.display_text()),
        Err(e) => {
            error!(error = %e, filename = %filename, "Upload prediction failed");
            if e.is_input_error() {
                render_index("Could not decode the audio file.")
            } else {
                render_index("Prediction failed, please try again.")
            }
        }
    }
}
