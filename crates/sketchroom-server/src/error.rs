use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sketchroom_core::{CoreError, ErrorKind};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Renders as `{ "error": message, "code": code }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No acting identity was supplied.
    #[error("Authentication required")]
    Unauthenticated,
}

pub type ApiResult<T> = Result<T, ApiError>;

fn core_status(error: &CoreError) -> StatusCode {
    match error.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Authorization => match error {
            CoreError::PasswordRequired | CoreError::InvalidPassword => StatusCode::UNAUTHORIZED,
            _ => StatusCode::FORBIDDEN,
        },
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Core(core) => {
                let status = core_status(core);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %core, "Internal core error");
                    (status, "INTERNAL_ERROR", "An internal error occurred".to_string())
                } else {
                    (status, core.code(), core.to_string())
                }
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                self.to_string(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchroom_core::StorageError;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(core_status(&CoreError::RoomNotFound("R".into())), StatusCode::NOT_FOUND);
        assert_eq!(core_status(&CoreError::RoomFull("R".into())), StatusCode::FORBIDDEN);
        assert_eq!(core_status(&CoreError::InvalidPassword), StatusCode::UNAUTHORIZED);
        assert_eq!(core_status(&CoreError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(core_status(&CoreError::RoomIdExhausted(10)), StatusCode::CONFLICT);
        assert_eq!(
            core_status(&CoreError::Storage(StorageError::Io("disk".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthenticated_is_401() {
        let response = ApiError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
