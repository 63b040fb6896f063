//! Main page route

use axum::response::Html;

use crate::server::page;

/// Serve the main page with an empty result line.
pub async fn index() -> Html<String> {
    page::render_index("")
}
