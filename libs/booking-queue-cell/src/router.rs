use std::sync::Arc;

use axum::{
    routing::{post, put},
    Router,
};

use crate::handlers::{call_next, get_display, select_date, select_display, stop_display};
use crate::DisplayService;

pub fn display_routes(service: Arc<DisplayService>) -> Router {
    Router::new()
        .route("/display", put(select_display).get(get_display).delete(stop_display))
        .route("/display/date", post(select_date))
        .route("/display/next", post(call_next))
        .with_state(service)
}
