//! HTTP route handlers

pub mod health;
pub mod index;
pub mod record;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, WildearError};
use crate::inference::Prediction;
use crate::server::state::AppState;

/// Run the blocking prediction pipeline off the async worker threads.
pub(crate) async fn run_prediction(state: &Arc<AppState>, path: PathBuf) -> Result<Prediction> {
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || state.predictor.predict_file(&path))
        .await
        .map_err(|e| WildearError::internal(format!("prediction task failed: {}", e)))?
}
