use std::sync::Arc;

use axum::{routing::get, Router};

use auth_cell::{auth_routes, AuthenticatedClient};
use booking_queue_cell::{display_routes, DisplayService};

pub fn create_router(client: Arc<AuthenticatedClient>, display: Arc<DisplayService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic queue display is running!" }))
        .nest("/auth", auth_routes(client))
        .merge(display_routes(display))
}
