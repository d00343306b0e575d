//! Conversion of service errors into HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{protocol::ErrorResponse, ServiceError};
use tracing::{error, warn};

/// Handler error: a [`ServiceError`] rendered as `{success:false, code, error}`.
///
/// The internal detail is logged here and nowhere else; the body carries only
/// [`ServiceError::public_message`].
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl<E> From<E> for ApiError
where
    E: Into<ServiceError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %err, code = err.code(), "request failed");
        } else {
            warn!(error = %err, code = err.code(), "request rejected");
        }

        let body = ErrorResponse::new(err.code(), err.public_message());
        (status, Json(body)).into_response()
    }
}
