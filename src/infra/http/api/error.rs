use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use crate::application::error::ErrorReport;
use crate::application::posts::SearchError;
use crate::application::source::UpstreamError;
use crate::domain::error::QueryError;

const SOURCE: &str = "infra::http::api";

/// Error response for the JSON API.
///
/// Client and internal failures render as `{"error": "<message>"}`; upstream
/// failures forward the upstream payload.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(status: StatusCode, message: &str, detail: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
            report: ErrorReport::from_message(SOURCE, status, detail),
        }
    }

    pub fn bad_request(err: &QueryError) -> Self {
        let message = err.to_string();
        Self::new(StatusCode::BAD_REQUEST, &message, message.clone())
    }

    pub fn upstream(err: &UpstreamError) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self {
            status,
            body: err.payload(),
            report: ErrorReport::from_error(SOURCE, status, err),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            detail,
        )
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found", "no route matched")
    }
}

impl From<SearchError> for ApiError {
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::Query(err) => ApiError::bad_request(&err),
            SearchError::Upstream(err) => ApiError::upstream(&err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        // Attach a structured report so shared logging middleware can emit rich diagnostics.
        self.report.attach(&mut response);
        response
    }
}
