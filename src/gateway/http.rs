//! HTTP transport for the gateway (`POST /authorize`, `POST /event`).
//!
//! Every refusal answers with the same [`Rejection`] body. The status is
//! `403` for anything the device could fix by being legitimate and `503`
//! when this gateway has no share to give.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use super::{Gateway, GatewayError};
use crate::protocol::{AuthorizationRequest, EventNotification, Rejection};

/// Builds the gateway router.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/authorize", post(authorize))
        .route("/event", post(event))
        .with_state(gateway)
}

/// Binds `addr` and serves until the listener fails.
pub async fn serve(gateway: Arc<Gateway>, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("gateway {} listening on {}", gateway.site_id(), listener.local_addr()?);
    axum::serve(listener, router(gateway)).await
}

async fn authorize(
    State(gateway): State<Arc<Gateway>>,
    Json(request): Json<AuthorizationRequest>,
) -> Response {
    match gateway.authorize(&request) {
        Ok(granted) => (StatusCode::OK, Json(granted)).into_response(),
        Err(e) => reject(e),
    }
}

async fn event(
    State(gateway): State<Arc<Gateway>>,
    Json(event): Json<EventNotification>,
) -> Response {
    match gateway.record_event(&event) {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(e) => reject(e),
    }
}

fn reject(err: GatewayError) -> Response {
    let status = match err {
        GatewayError::Misconfigured => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::DeviceNotAllowed | GatewayError::BadSignature | GatewayError::StaleTimestamp => {
            StatusCode::FORBIDDEN
        }
    };
    (status, Json(Rejection::denied())).into_response()
}
