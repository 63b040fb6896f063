//! Shared server state
//!
//! One `Arc<AppState>` is cloned into every handler. The predictor and label
//! set are immutable after startup, so no locking is needed; the request
//! counter is the only mutable piece and it is atomic.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::AppConfig;
use crate::error::Result;
use crate::error::WildearError;
use crate::inference::Predictor;

/// State shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// The loaded prediction pipeline
    pub predictor: Predictor,
    /// Start time for uptime calculation
    start_time: Instant,
    /// Prediction requests served
    request_count: AtomicU64,
}

impl AppState {
    pub fn new(config: AppConfig, predictor: Predictor) -> Self {
        Self {
            config,
            predictor,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        }
    }

    /// Count one prediction request, returning the new total.
    pub fn count_request(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Path under the scratch directory for a stored clip.
    pub fn scratch_path(&self, filename: &str) -> PathBuf {
        self.config.uploads_dir.join(filename)
    }

    /// Create the scratch directory if it does not exist yet.
    pub fn ensure_uploads_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.uploads_dir).map_err(|e| WildearError::Io {
            message: format!("failed to create uploads directory: {}", e),
            path: Some(self.config.uploads_dir.clone()),
        })
    }

    /// Delete a scratch file after a prediction attempt. `keep_uploads`
    /// preserves files for debugging; deletion failure only warns.
    pub fn cleanup_scratch(&self, path: &Path) {
        if self.config.keep_uploads {
            return;
        }
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
        }
    }
}
