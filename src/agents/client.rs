// HTTP implementation of the decision-service contract.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    AgentService, DecisionServices, DischargePlanningRequest, DischargePlanningResponse,
    ForecastRequest, ForecastResponse, OrScheduleResponse, ScheduleRequest, ScheduleResponse,
    SurgicalCase, TriageDecision, TriageRequest,
};
use crate::config::AgentEndpoints;
use crate::error::AgentError;

/// reqwest-backed client for the five decision services.
///
/// One shared connection pool, one bounded timeout for every request. A
/// call either returns a fully decoded response or one [`AgentError`];
/// retrying is deliberately not this layer's job.
pub struct AgentHttpClient {
    client: Client,
    endpoints: AgentEndpoints,
}

impl AgentHttpClient {
    pub fn new(endpoints: AgentEndpoints) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(endpoints.request_timeout_secs))
            .user_agent("careflow-orchestrator/0.1.0")
            .build()?;

        Ok(Self { client, endpoints })
    }

    fn base_url(&self, service: AgentService) -> &str {
        match service {
            AgentService::DemandForecast => &self.endpoints.demand_forecast,
            AgentService::StaffScheduling => &self.endpoints.staff_scheduling,
            AgentService::Triage => &self.endpoints.triage,
            AgentService::DischargePlanning => &self.endpoints.discharge_planning,
            AgentService::ErOrScheduling => &self.endpoints.er_or_scheduling,
        }
    }

    async fn post_json<Req, Resp>(
        &self,
        service: AgentService,
        path: &str,
        body: &Req,
    ) -> Result<Resp, AgentError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url(service), path);
        debug!("calling agent `{}` at {}", service.name(), url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::transport(service.name(), e))?;

        if !response.status().is_success() {
            return Err(AgentError::Status {
                service: service.name(),
                status: response.status(),
            });
        }

        response.json::<Resp>().await.map_err(|e| AgentError::Decode {
            service: service.name(),
            source: e,
        })
    }
}

#[async_trait]
impl DecisionServices for AgentHttpClient {
    async fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResponse, AgentError> {
        self.post_json(AgentService::DemandForecast, "/predict", request)
            .await
    }

    async fn plan_schedule(
        &self,
        request: &ScheduleRequest,
    ) -> Result<ScheduleResponse, AgentError> {
        self.post_json(AgentService::StaffScheduling, "/schedule", request)
            .await
    }

    async fn triage(&self, request: &TriageRequest) -> Result<TriageDecision, AgentError> {
        self.post_json(AgentService::Triage, "/triage", request).await
    }

    async fn plan_discharges(
        &self,
        request: &DischargePlanningRequest,
    ) -> Result<DischargePlanningResponse, AgentError> {
        self.post_json(AgentService::DischargePlanning, "/analyze", request)
            .await
    }

    async fn schedule_or(&self, cases: &[SurgicalCase]) -> Result<OrScheduleResponse, AgentError> {
        self.post_json(AgentService::ErOrScheduling, "/or/schedule", cases)
            .await
    }

    /// Liveness probe. Any transport error, timeout, or non-2xx status
    /// degrades to `false`; this method never raises.
    async fn probe(&self, service: AgentService) -> bool {
        let url = format!("{}/health", self.base_url(service));

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("health probe for `{}` failed: {}", service.name(), e);
                false
            }
        }
    }
}
