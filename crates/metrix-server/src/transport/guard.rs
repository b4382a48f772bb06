//! Trusted subnet admission middleware.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use metrix_core::error::MetrixError;

use crate::app_state::AppState;
use crate::transport::ApiError;

pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Reject with 403 when a subnet is configured and `X-Real-IP` is missing,
/// malformed, or outside it. A no-op otherwise.
pub async fn trusted_subnet(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(subnet) = state.trusted_subnet() else {
        return next.run(req).await;
    };

    let real_ip = req
        .headers()
        .get(REAL_IP_HEADER)
        .and_then(|v| v.to_str().ok());

    match real_ip {
        Some(ip) if subnet.admits(ip) => next.run(req).await,
        Some(ip) => {
            ApiError(MetrixError::Forbidden(format!("{ip} is outside the trusted subnet"))).into_response()
        }
        None => ApiError(MetrixError::Forbidden("missing X-Real-IP header".into())).into_response(),
    }
}
