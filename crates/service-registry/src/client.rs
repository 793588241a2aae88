use crate::api::{
    CleanupRequest, CleanupResponse, CountQuery, CountResponse, HealthyQuery, ListQuery,
    RegisterRequest, ServiceIdRequest, UpdateHealthRequest,
};
use crate::error::{RegistryError, Result};
use crate::{Metadata, ServiceRecord, ServiceStatus};
use reqwest::StatusCode;
use std::env;
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str = "http://service-registry:3003";

/// HTTP client for a registry server started by the `service-registry` binary.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Uses `SERVICE_REGISTRY_URL`, defaulting to `http://service-registry:3003`.
    pub fn from_env() -> Self {
        Self::new(env::var("SERVICE_REGISTRY_URL").unwrap_or_else(|_| DEFAULT_REGISTRY_URL.to_string()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response, subject: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(match status {
            StatusCode::NOT_FOUND => RegistryError::ServiceNotFound(subject.to_string()),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                RegistryError::Validation(error_text)
            }
            _ => RegistryError::ConnectionError(format!(
                "registry returned {}: {}",
                status, error_text
            )),
        })
    }

    pub async fn register(&self, service: &ServiceRecord) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/registry/register"))
            .json(&RegisterRequest {
                service: service.clone(),
            })
            .send()
            .await?;
        Self::check(response, &service.service_id).await?;
        Ok(())
    }

    pub async fn deregister(&self, service_id: &str) -> Result<()> {
        self.post_id("/api/registry/deregister", service_id).await
    }

    pub async fn heartbeat(&self, service_id: &str) -> Result<()> {
        self.post_id("/api/registry/heartbeat", service_id).await
    }

    async fn post_id(&self, path: &str, service_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(path))
            .json(&ServiceIdRequest {
                service_id: service_id.to_string(),
            })
            .send()
            .await?;
        Self::check(response, service_id).await?;
        Ok(())
    }

    pub async fn update_health(
        &self,
        service_id: &str,
        status: ServiceStatus,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/registry/health"))
            .json(&UpdateHealthRequest {
                service_id: service_id.to_string(),
                status,
                metadata,
            })
            .send()
            .await?;
        Self::check(response, service_id).await?;
        Ok(())
    }

    pub async fn get(&self, service_id: &str) -> Result<ServiceRecord> {
        let response = self
            .client
            .get(self.url(&format!("/api/registry/services/{}", service_id)))
            .send()
            .await?;
        Ok(Self::check(response, service_id).await?.json().await?)
    }

    pub async fn list(
        &self,
        service_type: Option<&str>,
        status: Option<ServiceStatus>,
    ) -> Result<Vec<ServiceRecord>> {
        let query = ListQuery {
            service_type: service_type.map(str::to_string),
            status,
        };
        let response = self
            .client
            .get(self.url("/api/registry/services"))
            .query(&query)
            .send()
            .await?;
        Ok(Self::check(response, "services").await?.json().await?)
    }

    pub async fn list_healthy(
        &self,
        service_type: Option<&str>,
        timeout: Duration,
    ) -> Result<Vec<ServiceRecord>> {
        let query = HealthyQuery {
            service_type: service_type.map(str::to_string),
            timeout_seconds: timeout.as_secs(),
        };
        let response = self
            .client
            .get(self.url("/api/registry/healthy"))
            .query(&query)
            .send()
            .await?;
        Ok(Self::check(response, "healthy services").await?.json().await?)
    }

    pub async fn cleanup(&self, timeout: Duration) -> Result<usize> {
        let response = self
            .client
            .post(self.url("/api/registry/cleanup"))
            .json(&CleanupRequest {
                timeout_seconds: timeout.as_secs(),
            })
            .send()
            .await?;
        let body: CleanupResponse = Self::check(response, "cleanup").await?.json().await?;
        Ok(body.removed)
    }

    pub async fn count(&self, service_type: Option<&str>) -> Result<u64> {
        let query = CountQuery {
            service_type: service_type.map(str::to_string),
        };
        let response = self
            .client
            .get(self.url("/api/registry/count"))
            .query(&query)
            .send()
            .await?;
        let body: CountResponse = Self::check(response, "count").await?.json().await?;
        Ok(body.count)
    }

    pub async fn types(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url("/api/registry/types"))
            .send()
            .await?;
        Ok(Self::check(response, "types").await?.json().await?)
    }
}
