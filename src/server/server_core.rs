//! Server core
//!
//! Axum router and server wrapper around the shared prediction state.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::inference::Predictor;
use crate::server::routes;
use crate::server::state::AppState;

/// Browser recordings arrive base64-encoded inside a JSON body, which
/// inflates them by a third over the raw clip.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::index::index))
        .route("/upload", post(routes::upload::upload))
        .route("/record", post(routes::record::record))
        .route("/health", get(routes::health::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Species identification server
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    /// Create a new server from configuration and a ready predictor
    pub fn new(config: AppConfig, predictor: Predictor) -> Self {
        Self {
            state: Arc::new(AppState::new(config, predictor)),
        }
    }

    /// Run the server until shutdown
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_addr();
        let species = self.state.predictor.num_classes();
        let router = create_router(self.state);

        info!("Serving {} species classifier on {}", species, addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
