use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tutera_core::TuteraError;

/// Handler error: any `anyhow::Error`, rendered as a Feathers-style JSON body.
#[derive(Debug)]
pub struct TuteraAxumError(pub anyhow::Error);

impl From<anyhow::Error> for TuteraAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<TuteraError> for TuteraAxumError {
    fn from(e: TuteraError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for TuteraAxumError {
    fn into_response(self) -> Response {
        // TuteraError anywhere in the chain keeps its kind; anything else is a 500.
        let err = TuteraError::normalize(self.0);
        if err.code() >= 500 {
            tracing::error!(error = %err, "request failed");
        }
        let safe = err.sanitize_for_client();
        let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(safe.to_json())).into_response()
    }
}
