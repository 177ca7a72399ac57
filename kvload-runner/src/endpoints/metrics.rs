use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Router, routing};

use crate::exposition;
use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new().route("/metrics", routing::get(metrics))
}

async fn metrics(State(state): State<ServiceState>) -> impl IntoResponse {
    let body = exposition::render(&state.summaries);
    ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body)
}
