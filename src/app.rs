use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};
use tower_http::trace::TraceLayer;

use crate::{handlers, route, state::AppState};

/// Every request goes through one dispatcher; paths are matched by
/// [`route::resolve`] rather than axum's path router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let operation = route::resolve(&method, uri.path());
    let user = state.identity.identify(&headers);

    match handlers::handle(&state, operation, user, &headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}
