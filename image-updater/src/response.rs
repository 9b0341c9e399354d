use crate::errors::UpdaterError;
use crate::platform::PlatformError;
use crate::updater::UpdateReport;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use shared::http::json_response;

pub type HandlerBody = BoxBody<Bytes, UpdaterError>;

pub const NO_MATCH_MESSAGE: &str = "No services matched the provided image prefixes";

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub message: String,
    pub updated_services: Vec<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Services updated before a failure. Omitted when nothing was attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_services: Option<Vec<String>>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        HealthResponse {
            status: "ok".into(),
        }
    }
}

/// Shapes the outcome of an update run into the HTTP response.
pub fn update_response(result: Result<UpdateReport, PlatformError>) -> Response<HandlerBody> {
    let report = match result {
        Ok(report) => report,
        Err(e) => return error_response(&UpdaterError::ListServices(e), None),
    };

    if let Some(failure) = report.failure {
        return error_response(&UpdaterError::UpdateFailed(failure), Some(report.updated));
    }

    let message = if report.matched == 0 {
        NO_MATCH_MESSAGE.to_string()
    } else {
        format!("Successfully updated {} service(s)", report.updated.len())
    };

    json_response(
        StatusCode::OK,
        &SuccessResponse {
            message,
            updated_services: report.updated,
        },
    )
}

pub fn error_response(
    err: &UpdaterError,
    updated_services: Option<Vec<String>>,
) -> Response<HandlerBody> {
    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.to_string(),
            updated_services,
        },
    )
}
