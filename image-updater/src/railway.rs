//! GraphQL client for the Railway backboard API.

use crate::config::{Credentials, PlatformConfig};
use crate::metrics_defs::PLATFORM_REQUEST_DURATION;
use crate::platform::{
    DeploymentPlatform, EnvironmentServices, PlatformError, ServiceDescriptor,
    ServiceInstanceUpdate,
};
use crate::replicas::resolve_replicas;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::histogram;
use std::collections::HashSet;
use std::time::Instant;
use url::Url;
use uuid::Uuid;

const ENVIRONMENT_QUERY: &str = r#"
query Environment($environmentId: String!, $after: String) {
    environment(id: $environmentId) {
        id
        projectId
        serviceInstances(after: $after) {
            edges {
                node {
                    id
                    serviceId
                    serviceName
                    latestDeployment {
                        meta
                    }
                    source {
                        image
                    }
                }
            }
            pageInfo {
                endCursor
                hasNextPage
            }
        }
    }
}
"#;

const SERVICE_INSTANCE_UPDATE: &str = r#"
mutation ServiceInstanceUpdate($environmentId: String!, $serviceId: String!, $input: ServiceInstanceUpdateInput!) {
    serviceInstanceUpdate(environmentId: $environmentId, serviceId: $serviceId, input: $input)
}
"#;

const SERVICE_INSTANCE_DEPLOY: &str = r#"
mutation ServiceInstanceDeploy($serviceId: String!, $environmentId: String!, $latestCommit: Boolean) {
    serviceInstanceDeploy(serviceId: $serviceId, environmentId: $environmentId, latestCommit: $latestCommit)
}
"#;

/// Upper bound on pages fetched for one environment listing.
const MAX_PAGES: usize = 100;

#[derive(Serialize)]
struct GraphQlRequest<'a, V> {
    query: &'a str,
    variables: V,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorMessage>>,
}

#[derive(Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentVariables<'a> {
    environment_id: String,
    after: Option<&'a str>,
}

#[derive(Deserialize)]
struct EnvironmentData {
    environment: EnvironmentNode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentNode {
    project_id: Option<String>,
    service_instances: ServiceInstanceConnection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceInstanceConnection {
    #[serde(default)]
    edges: Vec<ServiceInstanceEdge>,
    page_info: Option<PageInfo>,
}

#[derive(Deserialize)]
struct ServiceInstanceEdge {
    node: ServiceInstanceNode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceInstanceNode {
    service_id: String,
    service_name: String,
    latest_deployment: Option<LatestDeployment>,
    source: Option<ServiceSource>,
}

#[derive(Deserialize)]
struct LatestDeployment {
    meta: Option<Value>,
}

#[derive(Deserialize)]
struct ServiceSource {
    image: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateVariables<'a> {
    environment_id: String,
    service_id: &'a str,
    input: ServiceInstanceUpdateInput<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceInstanceUpdateInput<'a> {
    source: ImageSource<'a>,
    num_replicas: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    registry_credentials: Option<RegistryCredentialsInput<'a>>,
}

#[derive(Serialize)]
struct ImageSource<'a> {
    image: &'a str,
}

#[derive(Serialize)]
struct RegistryCredentialsInput<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployVariables<'a> {
    service_id: &'a str,
    environment_id: String,
    latest_commit: bool,
}

pub struct RailwayClient {
    client: reqwest::Client,
    api_url: Url,
    credentials: Credentials,
}

impl RailwayClient {
    pub fn new(config: &PlatformConfig, credentials: Credentials) -> Result<Self, PlatformError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(RailwayClient {
            client: builder.build()?,
            api_url: config.api_url.clone(),
            credentials,
        })
    }

    /// Sends one GraphQL operation and returns its `data` member.
    ///
    /// Variables are not logged; the update mutation carries registry credentials.
    async fn execute<V: Serialize>(
        &self,
        operation: &'static str,
        query: &str,
        variables: V,
    ) -> Result<Value, PlatformError> {
        tracing::debug!(operation, "Sending GraphQL request");
        let start = Instant::now();

        let response = self
            .client
            .post(self.api_url.clone())
            .bearer_auth(&self.credentials.api_token)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        histogram!(PLATFORM_REQUEST_DURATION, "operation" => operation)
            .record(start.elapsed().as_secs_f64());
        tracing::debug!(operation, status = status.as_u16(), "Received GraphQL response");

        if status != StatusCode::OK {
            return Err(PlatformError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GraphQlResponse =
            serde_json::from_str(&body).map_err(|source| PlatformError::Decode {
                what: "response",
                source,
            })?;

        if let Some(error) = envelope.errors.into_iter().flatten().next() {
            return Err(PlatformError::GraphQl(error.message));
        }

        Ok(envelope.data)
    }

    async fn query<T, V>(
        &self,
        operation: &'static str,
        what: &'static str,
        query: &str,
        variables: V,
    ) -> Result<T, PlatformError>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        let data = self.execute(operation, query, variables).await?;
        serde_json::from_value(data).map_err(|source| PlatformError::Decode { what, source })
    }
}

#[async_trait]
impl DeploymentPlatform for RailwayClient {
    async fn list_services(
        &self,
        environment_id: Uuid,
    ) -> Result<EnvironmentServices, PlatformError> {
        let mut listing = EnvironmentServices::default();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let variables = EnvironmentVariables {
                environment_id: environment_id.to_string(),
                after: cursor.as_deref(),
            };
            let data: EnvironmentData = self
                .query("Environment", "services", ENVIRONMENT_QUERY, variables)
                .await?;
            pages += 1;

            let environment = data.environment;
            if listing.project_id.is_none() {
                listing.project_id = environment.project_id;
            }

            for edge in environment.service_instances.edges {
                let node = edge.node;
                // Services without an image source (e.g. database plugins) are skipped
                let Some(image) = node.source.and_then(|s| s.image).filter(|i| !i.is_empty())
                else {
                    continue;
                };
                if !seen.insert(node.service_id.clone()) {
                    tracing::debug!(service = %node.service_name, "Service repeated across pages, skipping");
                    continue;
                }
                let meta = node.latest_deployment.and_then(|d| d.meta);
                let replicas = resolve_replicas(&node.service_name, meta.as_ref());

                listing.services.push(ServiceDescriptor {
                    id: node.service_id,
                    name: node.service_name,
                    image,
                    replicas,
                });
            }

            let next = environment
                .service_instances
                .page_info
                .filter(|page| page.has_next_page)
                .and_then(|page| page.end_cursor);

            match next {
                Some(_) if pages >= MAX_PAGES => {
                    tracing::warn!(
                        environment_id = %environment_id,
                        pages,
                        "Reached page limit, stopping"
                    );
                    break;
                }
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                Some(_) => {
                    tracing::warn!(
                        environment_id = %environment_id,
                        "Pagination cursor did not advance, stopping"
                    );
                    break;
                }
                None => break,
            }
        }

        tracing::debug!(
            environment_id = %environment_id,
            pages,
            services = listing.services.len(),
            "Listed services"
        );
        Ok(listing)
    }

    async fn update_service_instance(
        &self,
        environment_id: Uuid,
        update: &ServiceInstanceUpdate,
    ) -> Result<(), PlatformError> {
        let registry_credentials =
            self.credentials
                .registry
                .as_ref()
                .map(|registry| RegistryCredentialsInput {
                    username: &registry.username,
                    password: &registry.password,
                });

        let variables = UpdateVariables {
            environment_id: environment_id.to_string(),
            service_id: &update.service_id,
            input: ServiceInstanceUpdateInput {
                source: ImageSource {
                    image: &update.image,
                },
                num_replicas: update.replicas,
                registry_credentials,
            },
        };

        self.execute("ServiceInstanceUpdate", SERVICE_INSTANCE_UPDATE, variables)
            .await?;
        Ok(())
    }

    async fn deploy_service_instance(
        &self,
        environment_id: Uuid,
        service_id: &str,
    ) -> Result<(), PlatformError> {
        let variables = DeployVariables {
            service_id,
            environment_id: environment_id.to_string(),
            latest_commit: false,
        };

        self.execute("ServiceInstanceDeploy", SERVICE_INSTANCE_DEPLOY, variables)
            .await?;
        Ok(())
    }
}
