//! reqwest implementations of the runtime's collaborator traits
//!
//! Non-2xx responses surface as `CollaboratorError::Rejected` carrying the
//! status and body; network failures as `Transport`; unparseable bodies as
//! `Decode`.

use crate::config::ServiceConfig;
use crate::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};
use vigil_core::{OrganizationId, SuiteId, SuiteKind};
use vigil_runtime::{
    AlertMessage, AlertSender, ChartGenerator, ChartImage, CollaboratorError, CollaboratorResult,
    DeliveryReceipt, ExecuteRequest, ExecutionService, ScheduleRegistry, ScheduleUpdate,
};

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

async fn send(
    request: reqwest::RequestBuilder,
    url: &str,
) -> CollaboratorResult<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(|e| CollaboratorError::Transport(format!("{}: {}", url, e)))?;

    let status = response.status();
    if status.is_success() {
        debug!(%url, status = status.as_u16(), "Request succeeded");
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(CollaboratorError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> CollaboratorResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| CollaboratorError::Decode(format!("{}: {}", url, e)))
}

/// Starts suite executions over HTTP
#[derive(Debug, Clone)]
pub struct HttpExecutionService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExecutionService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::with_client(
            config.http_client()?,
            config.execution_url.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ExecutionService for HttpExecutionService {
    #[instrument(
        name = "execution.execute",
        skip(self, request, jwt),
        fields(test_suite_id = %request.test_suite_id)
    )]
    async fn execute(&self, request: &ExecuteRequest, jwt: &str) -> CollaboratorResult<()> {
        let url = endpoint(&self.base_url, "tests/execute");
        send(
            self.client.post(&url).bearer_auth(jwt).json(request),
            &url,
        )
        .await?;
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartRequest<'a> {
    test_suite_id: &'a SuiteId,
    target_org_id: &'a OrganizationId,
}

/// Requests history charts for anomaly alerts
#[derive(Debug, Clone)]
pub struct HttpChartGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChartGenerator {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::with_client(
            config.http_client()?,
            config.charts_url.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ChartGenerator for HttpChartGenerator {
    #[instrument(name = "charts.generate", skip(self), fields(test_suite_id = %suite_id))]
    async fn generate_chart(
        &self,
        suite_id: &SuiteId,
        org: &OrganizationId,
    ) -> CollaboratorResult<ChartImage> {
        let url = endpoint(&self.base_url, "charts");
        let body = ChartRequest {
            test_suite_id: suite_id,
            target_org_id: org,
        };
        let response = send(self.client.post(&url).json(&body), &url).await?;
        decode(response, &url).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertRequest<'a> {
    message: &'a AlertMessage,
    target_org_id: &'a OrganizationId,
}

/// Posts alerts to the organization's messaging integration
#[derive(Debug, Clone)]
pub struct HttpAlertSender {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAlertSender {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::with_client(
            config.http_client()?,
            config.alerts_url.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AlertSender for HttpAlertSender {
    #[instrument(
        name = "alerts.send",
        skip(self, message, jwt),
        fields(alert_id = %message.alert_id(), organization_id = %org)
    )]
    async fn send_alert(
        &self,
        message: &AlertMessage,
        org: &OrganizationId,
        jwt: &str,
    ) -> CollaboratorResult<DeliveryReceipt> {
        let url = endpoint(&self.base_url, "alerts");
        let body = AlertRequest {
            message,
            target_org_id: org,
        };
        let response = send(self.client.post(&url).bearer_auth(jwt).json(&body), &url).await?;
        decode(response, &url).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRequest<'a> {
    target_org_id: &'a OrganizationId,
    kind: SuiteKind,
    schedules: &'a [ScheduleUpdate],
}

/// Keeps the external scheduler's cron jobs in step with suites
#[derive(Debug, Clone)]
pub struct HttpScheduleRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScheduleRegistry {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::with_client(
            config.http_client()?,
            config.scheduler_url.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn submit(
        &self,
        method: reqwest::Method,
        org: &OrganizationId,
        kind: SuiteKind,
        schedules: &[ScheduleUpdate],
        jwt: &str,
    ) -> CollaboratorResult<()> {
        if schedules.is_empty() {
            return Ok(());
        }
        let url = endpoint(&self.base_url, "schedules");
        let body = ScheduleRequest {
            target_org_id: org,
            kind,
            schedules,
        };
        send(
            self.client
                .request(method, &url)
                .bearer_auth(jwt)
                .json(&body),
            &url,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleRegistry for HttpScheduleRegistry {
    #[instrument(
        name = "scheduler.create",
        skip(self, schedules, jwt),
        fields(organization_id = %org, kind = %kind, count = schedules.len())
    )]
    async fn create_schedules(
        &self,
        org: &OrganizationId,
        kind: SuiteKind,
        schedules: &[ScheduleUpdate],
        jwt: &str,
    ) -> CollaboratorResult<()> {
        self.submit(reqwest::Method::POST, org, kind, schedules, jwt)
            .await
    }

    #[instrument(
        name = "scheduler.update",
        skip(self, schedules, jwt),
        fields(organization_id = %org, kind = %kind, count = schedules.len())
    )]
    async fn update_schedules(
        &self,
        org: &OrganizationId,
        kind: SuiteKind,
        schedules: &[ScheduleUpdate],
        jwt: &str,
    ) -> CollaboratorResult<()> {
        self.submit(reqwest::Method::PATCH, org, kind, schedules, jwt)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("http://exec.local/", "tests/execute"), "http://exec.local/tests/execute");
        assert_eq!(endpoint("http://exec.local", "charts"), "http://exec.local/charts");
    }
}
