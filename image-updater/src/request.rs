//! Validation of `PUT /update` bodies.

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Reasons an update request is rejected with a 400.
#[derive(Error, Debug, PartialEq)]
pub enum RequestError {
    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid project_id: must be a valid UUID")]
    InvalidProjectId,

    #[error("Invalid environment_id: must be a valid UUID")]
    InvalidEnvironmentId,

    #[error("image_prefixes cannot be empty")]
    EmptyImagePrefixes,

    #[error("image_prefixes cannot contain empty values")]
    EmptyImagePrefix,

    #[error("new_version cannot be empty")]
    EmptyNewVersion,
}

/// Wire shape of the request body. Missing and `null` fields decode as empty.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequestBody {
    pub project_id: Option<String>,
    pub environment_id: Option<String>,
    pub image_prefixes: Option<Vec<String>>,
    pub new_version: Option<String>,
}

/// A request that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRequest {
    pub project_id: Uuid,
    pub environment_id: Uuid,
    pub image_prefixes: Vec<String>,
    pub new_version: String,
}

impl UpdateRequest {
    /// Decodes and validates a raw JSON body.
    pub fn from_json(bytes: &[u8]) -> Result<Self, RequestError> {
        let body: UpdateRequestBody = serde_json::from_slice(bytes)
            .map_err(|e| RequestError::InvalidJson(e.to_string()))?;
        Self::try_from(body)
    }
}

impl TryFrom<UpdateRequestBody> for UpdateRequest {
    type Error = RequestError;

    fn try_from(body: UpdateRequestBody) -> Result<Self, Self::Error> {
        let project_id = parse_uuid(body.project_id.as_deref())
            .ok_or(RequestError::InvalidProjectId)?;
        let environment_id = parse_uuid(body.environment_id.as_deref())
            .ok_or(RequestError::InvalidEnvironmentId)?;

        let image_prefixes = body.image_prefixes.unwrap_or_default();
        if image_prefixes.is_empty() {
            return Err(RequestError::EmptyImagePrefixes);
        }
        if image_prefixes.iter().any(String::is_empty) {
            return Err(RequestError::EmptyImagePrefix);
        }

        let new_version = body.new_version.unwrap_or_default();
        if new_version.is_empty() {
            return Err(RequestError::EmptyNewVersion);
        }

        Ok(UpdateRequest {
            project_id,
            environment_id,
            image_prefixes,
            new_version,
        })
    }
}

// Accepts hyphenated, simple, braced and urn forms.
fn parse_uuid(value: Option<&str>) -> Option<Uuid> {
    value.and_then(|v| Uuid::parse_str(v).ok())
}
