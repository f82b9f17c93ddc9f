use crate::browser::Navigator;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    #[serde(default)]
    pub url: String,
}

/// `/navigate/` handler. OPTIONS answers the CORS preflight, PUT carries the
/// navigation command, everything else is 405. The fixed response headers are
/// applied by the router layers, not here.
pub async fn navigate(
    State(navigator): State<Arc<dyn Navigator>>,
    method: Method,
    body: Bytes,
) -> Response {
    match method {
        Method::OPTIONS => StatusCode::OK.into_response(),
        Method::PUT => handle_put(navigator, &body).await,
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn handle_put(navigator: Arc<dyn Navigator>, body: &[u8]) -> Response {
    let payload: NavigateRequest = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };

    if payload.url.is_empty() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match navigator.navigate(&payload.url).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            warn!(url = %payload.url, %err, "navigate request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}
