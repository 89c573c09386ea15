use crate::errors::ApiError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Outcome code carried by every query response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptStatus {
    Success,
    Fail,
    InvalidParameters,
    ServerError,
}

/// Envelope wrapping query results and errors
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct QueryResponse<T> {
    #[serde(rename = "OPT_STATUS")]
    pub opt_status: OptStatus,
    /// Error message, empty on success
    #[serde(rename = "DESCRIPTION")]
    pub description: String,
    /// Result data, null on failure
    pub result: Option<T>,
}

impl<T> QueryResponse<T> {
    pub fn success(result: T) -> Self {
        Self {
            opt_status: OptStatus::Success,
            description: String::new(),
            result: Some(result),
        }
    }

    pub fn failure<S: ToString>(status: OptStatus, description: S) -> Self {
        Self {
            opt_status: status,
            description: description.to_string(),
            result: None,
        }
    }
}

/// Turns a `(data, error)` outcome into an HTTP response.
///
/// `Ok` is always `200` with `SUCCESS`; `Err` goes through [`ApiError`] and never
/// carries data.
pub struct JsonResponse<T>(pub Result<T, ApiError>);

impl<T, E> From<Result<T, E>> for JsonResponse<T>
where
    E: Into<ApiError>,
{
    fn from(result: Result<T, E>) -> Self {
        JsonResponse(result.map_err(Into::into))
    }
}

impl<T: Serialize> IntoResponse for JsonResponse<T> {
    fn into_response(self) -> Response {
        match self.0 {
            Ok(data) => (StatusCode::OK, Json(QueryResponse::success(data))).into_response(),
            Err(err) => err.into_response(),
        }
    }
}
