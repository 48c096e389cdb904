use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};

use crate::config::OxideConfig;

use super::{
    api::{OxideApi, OxideApiError},
    ExternalIp, FloatingIp, FloatingIpAttach, FloatingIpCreate, FloatingIpParentKind, Instance,
    NetworkInterface, ResultsPage,
};

/// Per-request deadline for every Oxide API call. Bounds how long a single
/// reconcile can block its controller worker.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// `OxideApi` implementation backed by the rack's external HTTP API.
pub struct OxideHttpClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl OxideHttpClient {
    pub fn new(config: &OxideConfig) -> Result<Self, OxideApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: config.host.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, OxideApiError> {
        let response = Self::check(request).await?;

        Ok(response.json().await?)
    }

    async fn execute_unit(request: RequestBuilder) -> Result<(), OxideApiError> {
        Self::check(request).await?;

        Ok(())
    }

    async fn check(request: RequestBuilder) -> Result<reqwest::Response, OxideApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(OxideApiError::NotFound);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(error_body) => error_body.message,
                Err(_) => body,
            };

            return Err(OxideApiError::Api(status.as_u16(), message));
        }

        Ok(response)
    }
}

#[async_trait]
impl OxideApi for OxideHttpClient {
    async fn instance_view(
        &self,
        instance: &str,
        project: Option<&str>,
    ) -> Result<Instance, OxideApiError> {
        let mut request = self.request(Method::GET, &format!("/v1/instances/{instance}"));

        if let Some(project) = project {
            request = request.query(&[("project", project)]);
        }

        Self::execute(request).await
    }

    async fn instance_network_interface_list(
        &self,
        instance: &str,
    ) -> Result<Vec<NetworkInterface>, OxideApiError> {
        let request = self
            .request(Method::GET, "/v1/network-interfaces")
            .query(&[("instance", instance)]);

        let page: ResultsPage<NetworkInterface> = Self::execute(request).await?;

        Ok(page.items)
    }

    async fn instance_external_ip_list(
        &self,
        instance: &str,
    ) -> Result<Vec<ExternalIp>, OxideApiError> {
        let request = self.request(
            Method::GET,
            &format!("/v1/instances/{instance}/external-ips"),
        );

        let page: ResultsPage<ExternalIp> = Self::execute(request).await?;

        Ok(page.items)
    }

    async fn floating_ip_view(
        &self,
        floating_ip: &str,
        project: &str,
    ) -> Result<FloatingIp, OxideApiError> {
        let request = self
            .request(Method::GET, &format!("/v1/floating-ips/{floating_ip}"))
            .query(&[("project", project)]);

        Self::execute(request).await
    }

    async fn floating_ip_create(
        &self,
        project: &str,
        params: FloatingIpCreate,
    ) -> Result<FloatingIp, OxideApiError> {
        let request = self
            .request(Method::POST, "/v1/floating-ips")
            .query(&[("project", project)])
            .json(&params);

        Self::execute(request).await
    }

    async fn floating_ip_attach(
        &self,
        floating_ip: &str,
        project: &str,
        instance: &str,
    ) -> Result<FloatingIp, OxideApiError> {
        let request = self
            .request(
                Method::POST,
                &format!("/v1/floating-ips/{floating_ip}/attach"),
            )
            .query(&[("project", project)])
            .json(&FloatingIpAttach {
                kind: FloatingIpParentKind::Instance,
                parent: instance.to_owned(),
            });

        Self::execute(request).await
    }

    async fn floating_ip_detach(
        &self,
        floating_ip: &str,
        project: &str,
    ) -> Result<FloatingIp, OxideApiError> {
        let request = self
            .request(
                Method::POST,
                &format!("/v1/floating-ips/{floating_ip}/detach"),
            )
            .query(&[("project", project)]);

        Self::execute(request).await
    }

    async fn floating_ip_delete(
        &self,
        floating_ip: &str,
        project: &str,
    ) -> Result<(), OxideApiError> {
        let request = self
            .request(Method::DELETE, &format!("/v1/floating-ips/{floating_ip}"))
            .query(&[("project", project)]);

        Self::execute_unit(request).await
    }
}
