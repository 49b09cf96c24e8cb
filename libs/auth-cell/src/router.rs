use std::sync::Arc;

use axum::{routing::get, Router};

use crate::{handlers, AuthenticatedClient};

pub fn auth_routes(client: Arc<AuthenticatedClient>) -> Router {
    Router::new()
        .route(
            "/session",
            get(handlers::get_session)
                .post(handlers::create_session)
                .delete(handlers::delete_session),
        )
        .with_state(client)
}
