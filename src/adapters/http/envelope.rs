//! `IntoResponse` for [`Outcome`].
//!
//! The HTTP status equals the envelope code, so clients can branch on
//! either.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::Outcome;

impl<T: Serialize> IntoResponse for Outcome<T> {
    fn into_response(self) -> Response {
        let envelope = self.into_envelope();
        let status =
            StatusCode::from_u16(envelope.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if envelope.code != 200 {
            tracing::debug!(code = envelope.code, message = %envelope.message, "Request failed");
        }

        (status, Json(envelope)).into_response()
    }
}
