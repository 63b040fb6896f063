//! Web front-end
//!
//! A small Axum server around the prediction pipeline:
//! - Landing page with an upload form and an in-browser recorder
//! - Multipart uploads rendered back into the page
//! - Base64 recordings posted as JSON
//! - Health endpoint for monitoring

pub mod page;
pub mod routes;
pub mod server_core;
pub mod state;
pub mod types;

pub use server_core::{create_router, Server};
pub use state::AppState;
pub use types::*;
