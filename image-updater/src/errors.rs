use crate::platform::PlatformError;
use crate::request::RequestError;
use crate::updater::UpdateFailure;
use hyper::StatusCode;
use thiserror::Error;

/// Errors surfaced by the HTTP service
#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),

    #[error("Method not allowed, use PUT")]
    MethodNotAllowed,

    #[error("Failed to update services: failed to get services: {0}")]
    ListServices(#[source] PlatformError),

    #[error("Failed to update services: {0}")]
    UpdateFailed(#[from] UpdateFailure),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdaterError {
    /// HTTP status the error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            UpdaterError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            UpdaterError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            UpdaterError::ListServices(_)
            | UpdaterError::UpdateFailed(_)
            | UpdaterError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
