use axum::Router;
use stx::kernel::server::ApiState;
use tower_http::trace::TraceLayer;

#[allow(unreachable_pub)]
pub fn init(state: ApiState) -> Router {
    // The kernel owns the actual routes; the app only applies tracing and
    // binds the state.
    Router::new()
        .merge(stx::kernel::server::system_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
