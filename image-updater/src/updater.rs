//! Sequential update-and-deploy of matched services.

use crate::image::{PlannedUpdate, plan_updates};
use crate::metrics_defs::{SERVICE_UPDATE_FAILURES, SERVICES_UPDATED};
use crate::platform::{DeploymentPlatform, PlatformError, ServiceInstanceUpdate};
use crate::request::UpdateRequest;
use shared::counter;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// The remote operation that failed for a service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateStep {
    UpdateImage,
    Deploy,
}

impl UpdateStep {
    pub const fn as_str(&self) -> &'static str {
        match self {
            UpdateStep::UpdateImage => "update_image",
            UpdateStep::Deploy => "deploy",
        }
    }
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStep::UpdateImage => f.write_str("update service instance"),
            UpdateStep::Deploy => f.write_str("deploy service instance"),
        }
    }
}

#[derive(Error, Debug)]
#[error("failed to update service {service}: failed to {step}: {source}")]
pub struct UpdateFailure {
    pub service: String,
    pub step: UpdateStep,
    pub source: PlatformError,
}

/// Outcome of applying an update plan.
///
/// `updated` holds the services that were updated and redeployed, in order,
/// even when a later service failed.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub matched: usize,
    pub updated: Vec<String>,
    pub failure: Option<UpdateFailure>,
}

/// Lists the environment's services, then updates every match.
///
/// Only a failed listing is returned as an error; update failures are part of
/// the report.
pub async fn update_services<P>(
    platform: &P,
    request: &UpdateRequest,
) -> Result<UpdateReport, PlatformError>
where
    P: DeploymentPlatform + ?Sized,
{
    let listing = platform.list_services(request.environment_id).await?;

    if let Some(project_id) = &listing.project_id
        && Uuid::parse_str(project_id).ok() != Some(request.project_id)
    {
        tracing::warn!(
            requested = %request.project_id,
            actual = %project_id,
            environment_id = %request.environment_id,
            "Environment belongs to a different project"
        );
    }

    let plan = plan_updates(
        listing.services,
        &request.image_prefixes,
        &request.new_version,
    );

    Ok(apply_updates(platform, request.environment_id, plan).await)
}

/// Updates and redeploys each planned service in order, stopping at the
/// first failure. Nothing is rolled back.
pub async fn apply_updates<P>(
    platform: &P,
    environment_id: Uuid,
    plan: Vec<PlannedUpdate>,
) -> UpdateReport
where
    P: DeploymentPlatform + ?Sized,
{
    let mut report = UpdateReport {
        matched: plan.len(),
        ..Default::default()
    };

    for planned in plan {
        let service = planned.service;
        tracing::info!(
            service = %service.name,
            from = %service.image,
            to = %planned.new_image,
            replicas = service.replicas,
            "Updating service"
        );

        let update = ServiceInstanceUpdate {
            service_id: service.id.clone(),
            image: planned.new_image,
            replicas: service.replicas,
        };

        let result = match platform.update_service_instance(environment_id, &update).await {
            Ok(()) => platform
                .deploy_service_instance(environment_id, &service.id)
                .await
                .map_err(|e| (UpdateStep::Deploy, e)),
            Err(e) => Err((UpdateStep::UpdateImage, e)),
        };

        match result {
            Ok(()) => {
                counter!(SERVICES_UPDATED).increment(1);
                report.updated.push(service.name);
            }
            Err((step, source)) => {
                counter!(SERVICE_UPDATE_FAILURES, "step" => step.as_str()).increment(1);
                tracing::error!(
                    service = %service.name,
                    step = step.as_str(),
                    error = %source,
                    updated = report.updated.len(),
                    "Service update failed, skipping remaining services"
                );
                report.failure = Some(UpdateFailure {
                    service: service.name,
                    step,
                    source,
                });
                break;
            }
        }
    }

    report
}
