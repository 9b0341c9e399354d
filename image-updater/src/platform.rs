use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Failure of a single call to the deployment platform
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("failed to execute request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("GraphQL error: {0}")]
    GraphQl(String),
}

/// A service with an image source, as listed by the platform.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceDescriptor {
    pub id: String,
    pub name: String,
    pub image: String,
    pub replicas: u32,
}

/// The services of one environment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvironmentServices {
    /// Project the environment belongs to, when reported.
    pub project_id: Option<String>,
    pub services: Vec<ServiceDescriptor>,
}

/// New image source and replica count for a service instance.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceInstanceUpdate {
    pub service_id: String,
    pub image: String,
    pub replicas: u32,
}

/// Operations the updater needs from a deployment platform.
#[async_trait]
pub trait DeploymentPlatform: Send + Sync {
    /// Lists services that have an image source, with resolved replica counts.
    async fn list_services(
        &self,
        environment_id: Uuid,
    ) -> Result<EnvironmentServices, PlatformError>;

    /// Points a service instance at a new image.
    async fn update_service_instance(
        &self,
        environment_id: Uuid,
        update: &ServiceInstanceUpdate,
    ) -> Result<(), PlatformError>;

    /// Triggers a redeploy of a service instance.
    async fn deploy_service_instance(
        &self,
        environment_id: Uuid,
        service_id: &str,
    ) -> Result<(), PlatformError>;
}
