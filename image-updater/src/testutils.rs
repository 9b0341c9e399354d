use crate::platform::{
    DeploymentPlatform, EnvironmentServices, PlatformError, ServiceDescriptor,
    ServiceInstanceUpdate,
};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

pub fn service(name: &str, image: &str, replicas: u32) -> ServiceDescriptor {
    ServiceDescriptor {
        id: format!("{name}-id"),
        name: name.to_string(),
        image: image.to_string(),
        replicas,
    }
}

/// A request received by [`MockGraphQlServer`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

type Responder = dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync;

/// In-process GraphQL endpoint that records requests and answers with `respond`.
pub struct MockGraphQlServer {
    port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockGraphQlServer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let respond: Arc<Responder> = Arc::new(respond);

        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let io = TokioIo::new(stream);
                let recorded = recorded.clone();
                let respond = respond.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let recorded = recorded.clone();
                        let respond = respond.clone();
                        async move {
                            let authorization = req
                                .headers()
                                .get(AUTHORIZATION)
                                .and_then(|v| v.to_str().ok())
                                .map(String::from);
                            let bytes = req.into_body().collect().await?.to_bytes();
                            let request = RecordedRequest {
                                authorization,
                                body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
                            };

                            let (status, body) = respond(&request);
                            recorded.lock().unwrap().push(request);

                            let response = Response::builder()
                                .status(status)
                                .header(CONTENT_TYPE, "application/json")
                                .body(Full::new(Bytes::from(body)))
                                .unwrap();
                            Ok::<_, hyper::Error>(response)
                        }
                    });

                    let _ = Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        MockGraphQlServer {
            port,
            requests,
            handle,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://127.0.0.1:{}/graphql/v2", self.port)).unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockGraphQlServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlatformCall {
    List(Uuid),
    Update(Uuid, ServiceInstanceUpdate),
    Deploy(Uuid, String),
}

/// In-memory platform that records calls and fails on demand.
#[derive(Default)]
pub struct FakePlatform {
    listing: EnvironmentServices,
    fail_list: Option<String>,
    fail_update_for: Option<String>,
    fail_deploy_for: Option<String>,
    calls: Mutex<Vec<PlatformCall>>,
}

impl FakePlatform {
    pub fn with_services(services: Vec<ServiceDescriptor>) -> Self {
        FakePlatform {
            listing: EnvironmentServices {
                project_id: None,
                services,
            },
            ..Default::default()
        }
    }

    pub fn with_project(mut self, project_id: &str) -> Self {
        self.listing.project_id = Some(project_id.to_string());
        self
    }

    pub fn failing_list(mut self, message: &str) -> Self {
        self.fail_list = Some(message.to_string());
        self
    }

    pub fn failing_update(mut self, service_id: &str) -> Self {
        self.fail_update_for = Some(service_id.to_string());
        self
    }

    pub fn failing_deploy(mut self, service_id: &str) -> Self {
        self.fail_deploy_for = Some(service_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DeploymentPlatform for FakePlatform {
    async fn list_services(
        &self,
        environment_id: Uuid,
    ) -> Result<EnvironmentServices, PlatformError> {
        self.record(PlatformCall::List(environment_id));
        match &self.fail_list {
            Some(message) => Err(PlatformError::GraphQl(message.clone())),
            None => Ok(self.listing.clone()),
        }
    }

    async fn update_service_instance(
        &self,
        environment_id: Uuid,
        update: &ServiceInstanceUpdate,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Update(environment_id, update.clone()));
        if self.fail_update_for.as_deref() == Some(update.service_id.as_str()) {
            return Err(PlatformError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(())
    }

    async fn deploy_service_instance(
        &self,
        environment_id: Uuid,
        service_id: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Deploy(environment_id, service_id.to_string()));
        if self.fail_deploy_for.as_deref() == Some(service_id) {
            return Err(PlatformError::GraphQl("deployment quota exceeded".to_string()));
        }
        Ok(())
    }
}
