//! HTTP server module

mod api;
mod attribution;
mod ingest;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::ConnectInfo,
    http::HeaderMap,
    middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::middleware::auth_middleware;

pub use api::HealthResponse;
pub use attribution::{
    AttributionResponse, FeedbackRequest, FeedbackResponse, SubmitRequest, SubmitResponse,
};
pub use ingest::{ClickRequest, PageViewRequest, RecordedResponse};

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/attributions", post(attribution::submit))
        .route("/api/attributions/:id", get(attribution::get_attribution))
        .route("/api/attributions/:id/feedback", post(attribution::feedback))
        .route("/api/clicks", post(ingest::record_click))
        .route("/api/pageviews", post(ingest::record_page_view))
        .route_layer(middleware::from_fn(auth_middleware));

    Router::new()
        .route("/api/health", get(api::health))
        .merge(protected)
        .layer(Extension(state.auth.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Origin IP of a request
///
/// Forwarding headers are only read when the peer is a trusted proxy. Then
/// the origin is the right-most `x-forwarded-for` hop that is not itself a
/// trusted proxy, or `x-real-ip`. Anyone else is taken at their socket
/// address.
pub(crate) fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    if !peer.is_some_and(|ip| trusted_proxies.contains(&ip)) {
        return peer;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.rsplit(',')
                .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
                .find(|hop| !trusted_proxies.contains(hop))
        });
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    forwarded.or_else(real_ip).or(peer)
}
