use crate::executor::ExecuteError;
use crate::response::{OptStatus, QueryResponse};
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub detail: String,
    pub status: OptStatus,
    pub status_code: StatusCode,
}

impl ApiError {
    /// Create a new ApiError with a detail message, outcome and status code
    pub fn new<S: ToString>(detail: S, status: OptStatus, status_code: StatusCode) -> Self {
        Self {
            detail: detail.to_string(),
            status,
            status_code,
        }
    }

    /// Create new Internal Server Error (500) with a detail message
    pub fn internal<S: ToString>(detail: S) -> Self {
        Self::new(
            detail,
            OptStatus::ServerError,
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }

    /// Create new Bad Request Error (400) for rejected request parameters
    pub fn bad_request<S: ToString>(detail: S) -> Self {
        Self::new(detail, OptStatus::InvalidParameters, StatusCode::BAD_REQUEST)
    }

    /// Create new Bad Request Error (400) for a query the backend refused
    pub fn query_failed<S: ToString>(detail: S) -> Self {
        Self::new(detail, OptStatus::Fail, StatusCode::BAD_REQUEST)
    }

    /// Create new Bad Gateway (502) with a detail message
    pub fn bad_gateway<S: ToString>(detail: S) -> Self {
        Self::new(detail, OptStatus::ServerError, StatusCode::BAD_GATEWAY)
    }

    /// Create new Gateway Timeout (504) with a detail message
    pub fn gateway_timeout<S: ToString>(detail: S) -> Self {
        Self::new(detail, OptStatus::ServerError, StatusCode::GATEWAY_TIMEOUT)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = QueryResponse::<()>::failure(self.status, self.detail);
        (self.status_code, Json(body)).into_response()
    }
}

impl From<ExecuteError> for ApiError {
    fn from(err: ExecuteError) -> Self {
        let detail = err.to_string();
        match err {
            ExecuteError::EmptySql
            | ExecuteError::InvalidHost(_)
            | ExecuteError::HostNotAllowed(_) => {
                ApiError::bad_request(detail)
            }
            ExecuteError::BuildError(_) => {
                ApiError::internal("Failed to build request to ClickHouse")
            }
            ExecuteError::RequestError(e) if e.is_timeout() => ApiError::gateway_timeout(detail),
            ExecuteError::RequestError(_) => ApiError::bad_gateway(detail),
            ExecuteError::Backend { status, .. } if status.is_client_error() => {
                ApiError::query_failed(detail)
            }
            ExecuteError::Backend { .. } => ApiError::bad_gateway(detail),
            ExecuteError::ParseError(_) => ApiError::internal(detail),
        }
    }
}
