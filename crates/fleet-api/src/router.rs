use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use fleet_db::ConnectionPool;

use crate::{state::ApiState, vehicle};

pub fn router<P>() -> Router<ApiState<P>>
where
    P: ConnectionPool + Clone + 'static,
{
    Router::new()
        .route("/health", get(health))
        .nest("/api", vehicle::routes())
        .fallback(handler_404)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn handler_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        "The requested resource was not found",
    )
}
