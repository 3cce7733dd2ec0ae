use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use qlrgen_core::error::QlrError;
use serde::Serialize;

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<QlrError> for ApiError {
    fn from(err: QlrError) -> Self {
        let details = err.to_string();
        let error = match &err {
            QlrError::UnknownCollection { .. } => Self::bad_request("Unknown collection"),
            QlrError::InvalidUrl { .. } => Self::bad_request("Invalid URL"),
            QlrError::InvalidRaster { .. } => Self::bad_request("Source is not a usable raster"),
            QlrError::UnreachableSource {
                timed_out: true, ..
            } => Self::gateway_timeout("Timed out reading source"),
            QlrError::UnreachableSource { .. } => Self::bad_gateway("Source unreachable"),
            _ => Self::internal("Internal error"),
        };
        error.with_details(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn status(err: QlrError) -> StatusCode {
        ApiError::from(err).status
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status(QlrError::UnknownCollection { id: "x".into() }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(QlrError::InvalidUrl {
                url: "ftp://x".into(),
                reason: "scheme".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(QlrError::invalid_raster("u", "r")), StatusCode::BAD_REQUEST);
        assert_eq!(status(QlrError::unreachable("u", "r")), StatusCode::BAD_GATEWAY);
        assert_eq!(status(QlrError::timed_out("u", "r")), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status(QlrError::MissingSubstitution {
                template: PathBuf::from("t.qlr"),
                token: "xmin".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(QlrError::Internal { reason: "r".into() }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_details_carry_cause() {
        let err = ApiError::from(QlrError::UnknownCollection {
            id: "landsat".into(),
        });
        assert_eq!(err.details.as_deref(), Some("Unknown collection: landsat"));
    }
}
