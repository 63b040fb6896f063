//! Request and response bodies

use serde::{Deserialize, Serialize};

/// Body of `POST /record`: a base64 audio blob, usually as a data URL
/// (`data:audio/wav;base64,...`) produced by the in-browser recorder.
#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    #[serde(default)]
    pub audio: Option<String>,
}

/// Successful `POST /record` response.
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub success: bool,
    /// Display text, e.g. `Predicted Species: Ardea purpurea`.
    pub prediction: String,
}

/// Error body for JSON endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// `GET /health` response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Seconds since startup
    pub uptime: u64,
    /// Number of species the model distinguishes
    pub species: usize,
    /// Prediction requests served since startup
    pub requests_served: u64,
}
