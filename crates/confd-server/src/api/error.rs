use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Failure of a control-plane request.
///
/// Business "no match" outcomes are `200` responses with `success: false`;
/// only infrastructure failures take this path.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] confd_core::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Core(confd_core::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(confd_core::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_errors_are_500() {
        let response = ApiError::from(confd_core::Error::Cache("connection refused".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_input_is_400() {
        let response = ApiError::from(confd_core::Error::InvalidInput("bad regex".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
