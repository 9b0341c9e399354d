use crate::errors::UpdaterError;
use crate::metrics_defs::REQUEST_DURATION;
use crate::platform::DeploymentPlatform;
use crate::request::{RequestError, UpdateRequest};
use crate::response::{HandlerBody, HealthResponse, error_response, update_response};
use crate::updater::update_services;
use http_body_util::BodyExt;
use hyper::body::{Body, Incoming};
use hyper::header::{ALLOW, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::histogram;
use shared::http::{json_response, make_error_response};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Serves `PUT /update` and `GET /health`.
#[derive(Clone)]
pub struct UpdaterService {
    platform: Arc<dyn DeploymentPlatform>,
}

impl UpdaterService {
    pub fn new(platform: Arc<dyn DeploymentPlatform>) -> Self {
        Self { platform }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<HandlerBody>
    where
        B: Body,
        B::Error: Display,
    {
        let start = Instant::now();
        let path = match req.uri().path() {
            "/update" => "/update",
            "/health" => "/health",
            _ => "other",
        };

        let response = match path {
            "/update" => self.handle_update(req).await,
            "/health" => json_response(StatusCode::OK, &HealthResponse::ok()),
            _ => make_error_response(StatusCode::NOT_FOUND),
        };

        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "Handled request");
        histogram!(REQUEST_DURATION, "path" => path, "status" => status.as_str().to_owned())
            .record(start.elapsed().as_secs_f64());

        response
    }

    async fn handle_update<B>(&self, req: Request<B>) -> Response<HandlerBody>
    where
        B: Body,
        B::Error: Display,
    {
        if req.method() != Method::PUT {
            let mut response = error_response(&UpdaterError::MethodNotAllowed, None);
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("PUT"));
            return response;
        }

        let request = match read_update_request(req).await {
            Ok(request) => request,
            Err(e) => {
                tracing::info!(error = %e, "Rejected update request");
                return error_response(&UpdaterError::from(e), None);
            }
        };

        tracing::info!(
            project_id = %request.project_id,
            environment_id = %request.environment_id,
            prefixes = ?request.image_prefixes,
            version = %request.new_version,
            "Received update request"
        );

        let result = update_services(self.platform.as_ref(), &request).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, environment_id = %request.environment_id, "Failed to list services");
        }
        update_response(result)
    }
}

async fn read_update_request<B>(req: Request<B>) -> Result<UpdateRequest, RequestError>
where
    B: Body,
    B::Error: Display,
{
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| RequestError::Body(e.to_string()))?
        .to_bytes();
    UpdateRequest::from_json(&bytes)
}

impl Service<Request<Incoming>> for UpdaterService {
    type Response = Response<HandlerBody>;
    type Error = UpdaterError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}
