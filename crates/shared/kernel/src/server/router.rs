use crate::rpc::ApiRegistry;
use crate::server::state::ApiState;
use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};

/// The system routes every node exposes: the JSON-RPC endpoint and the
/// health check.
pub fn system_router() -> Router<ApiState> {
    super::health::mark_started();
    Router::new().route("/", post(rpc_handler)).route("/health", get(super::health::health_handler))
}

/// The single JSON-RPC entry point. The registry shapes every failure into a
/// response body, so this handler never errors at the HTTP level.
async fn rpc_handler(State(registry): State<ApiRegistry>, body: String) -> impl IntoResponse {
    let response = registry.call(&body).await;
    ([(header::CONTENT_TYPE, "application/json")], response)
}
