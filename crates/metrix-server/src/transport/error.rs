//! Error -> HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use metrix_core::error::{ClientCode, MetrixError};

/// Handler error. The body is the error's display string as plain text.
#[derive(Debug)]
pub struct ApiError(pub MetrixError);

impl From<MetrixError> for ApiError {
    fn from(e: MetrixError) -> Self {
        ApiError(e)
    }
}

pub fn status_of(code: ClientCode) -> StatusCode {
    match code {
        ClientCode::BadRequest => StatusCode::BAD_REQUEST,
        ClientCode::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        ClientCode::NotFound => StatusCode::NOT_FOUND,
        ClientCode::Forbidden => StatusCode::FORBIDDEN,
        ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        if code == ClientCode::Internal {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, code = code.as_str(), "request rejected");
        }
        (status_of(code), self.0.to_string()).into_response()
    }
}
