use crate::{pipeline::FlowError, source::SourceError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error("Invalid upload: {0}")]
    Multipart(String),
    #[error("Something went wrong: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Flow(e) => e.kind(),
            ApiError::Multipart(_) => "BadRequest",
            ApiError::Internal(_) => "Internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Flow(FlowError::Source(source)) => match source {
                SourceError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                SourceError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SourceError::DeviceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                SourceError::CaptureFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Flow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        ApiError::Flow(FlowError::Source(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectError;

    #[test]
    fn test_status_codes() {
        let unsupported = ApiError::from(SourceError::UnsupportedFormat(".gif".into()));
        let unavailable = ApiError::from(SourceError::DeviceUnavailable {
            index: 0,
            reason: "busy".into(),
        });
        let inference = ApiError::Flow(FlowError::Inference(DetectError::Inference("x".into())));

        assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(inference.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(inference.kind(), "InferenceError");
    }

    #[test]
    fn test_device_message_carries_hint() {
        let err = ApiError::from(SourceError::DeviceUnavailable {
            index: 1,
            reason: "busy".into(),
        });

        assert!(err.to_string().contains("camera permissions"));
    }
}
