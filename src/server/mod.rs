// The HTTP control surface: one prefix-matched route, loopback only, no TLS.
//
//   OPTIONS /navigate/   → 200 (CORS preflight)
//   PUT     /navigate/   → {"url": "<target>"} drives the kiosk session
//   other   /navigate/   → 405

pub mod routes;

use crate::browser::Navigator;
use crate::errors::Result;
use axum::http::{header, HeaderValue};
use axum::routing::any;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

/// Build the control endpoint router. Every response, including 404s and
/// error branches, carries the fixed identification and CORS headers.
pub fn router(navigator: Arc<dyn Navigator>) -> Router {
    Router::new()
        .route("/navigate/", any(routes::navigate))
        .route("/navigate/*rest", any(routes::navigate))
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static("kiosk"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, GET, OPTIONS, PUT, DELETE"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(
                "Accept, Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization",
            ),
        ))
        .with_state(navigator)
}

/// Bind the listener and serve until the process exits.
pub async fn serve(addr: SocketAddr, navigator: Arc<dyn Navigator>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("control endpoint listening on http://{addr}");
    axum::serve(listener, router(navigator)).await?;
    Ok(())
}
