//! Decision-service boundary: the typed request/response contract to each
//! external agent, and the trait the supervisor orchestrates against.
//!
//! Calls are single best-effort round trips. No retry or backoff lives
//! here; whether a failure is tolerable is decided by the caller.

mod client;

pub use client::AgentHttpClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AgentError;

/// The fixed set of decision services this orchestrator knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AgentService {
    DemandForecast,
    StaffScheduling,
    Triage,
    DischargePlanning,
    ErOrScheduling,
}

impl AgentService {
    pub const ALL: [AgentService; 5] = [
        AgentService::DemandForecast,
        AgentService::StaffScheduling,
        AgentService::Triage,
        AgentService::DischargePlanning,
        AgentService::ErOrScheduling,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AgentService::DemandForecast => "demand_forecast",
            AgentService::StaffScheduling => "staff_scheduling",
            AgentService::Triage => "triage",
            AgentService::DischargePlanning => "discharge_planning",
            AgentService::ErOrScheduling => "er_or_scheduling",
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types. Field names are the wire format of the agent APIs.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ForecastRequest {
    pub horizon_days: u32,
    /// Reference date for the forecast, `YYYY-MM-DD`.
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: String,
    pub predicted_volume: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
}

impl ForecastPoint {
    /// Whether the confidence interval actually brackets the prediction.
    /// The forecasting model is authoritative, so violations are reported
    /// rather than rejected.
    pub fn bounds_consistent(&self) -> bool {
        self.confidence_lower <= self.predicted_volume
            && self.predicted_volume <= self.confidence_upper
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub predictions: Vec<ForecastPoint>,
    pub model_version: String,
    pub generated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VitalSigns {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure_systolic: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure_diastolic: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffMember {
    pub staff_id: String,
    pub name: String,
    pub role: String,
    pub max_hours_per_week: u32,
    pub qualifications: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinStaffPerShift {
    pub morning: u32,
    pub afternoon: u32,
    pub night: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleConstraints {
    pub min_staff_per_shift: MinStaffPerShift,
    pub shift_duration_hours: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_data: Option<ForecastResponse>,
    pub staff_list: Vec<StaffMember>,
    pub constraints: ScheduleConstraints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftAssignment {
    pub staff_id: String,
    pub date: String,
    pub shift: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleResponse {
    pub schedule: Vec<ShiftAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageRequest {
    pub patient_id: String,
    /// Free-text symptom description.
    pub symptoms: String,
    pub vitals: VitalSigns,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<Vec<String>>,
}

/// Outcome of one triage assessment. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageDecision {
    pub patient_id: String,
    /// ESI-style ordinal: 1 = Resuscitation (most severe) .. 5 = Non-Urgent.
    pub acuity_level: u8,
    pub acuity_label: String,
    pub confidence: f64,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    pub recommended_action: String,
    pub model_version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InpatientSnapshot {
    pub patient_id: String,
    pub admission_date: String,
    pub diagnosis: String,
    pub vitals: VitalSigns,
    pub procedures_completed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DischargePlanningRequest {
    pub current_patients: Vec<InpatientSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeCandidate {
    pub patient_id: String,
    /// Confidence in [0, 1] that this inpatient is safe to discharge.
    pub discharge_readiness_score: f64,
    pub estimated_discharge_date: String,
    #[serde(default)]
    pub criteria_met: BTreeMap<String, bool>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DischargePlanningResponse {
    pub discharge_candidates: Vec<DischargeCandidate>,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurgicalCase {
    pub case_id: String,
    pub procedure_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrAssignment {
    pub case_id: String,
    pub or_room: u32,
    pub start_time: String,
    pub estimated_duration: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrScheduleResponse {
    pub schedule: Vec<OrAssignment>,
}

/// One operation per decision-service capability.
///
/// Implementations perform exactly one request/response round trip per
/// call. `probe` is the exception to the error contract: it reports
/// liveness as a boolean and must never fail itself.
#[async_trait]
pub trait DecisionServices: Send + Sync {
    async fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResponse, AgentError>;

    async fn plan_schedule(&self, request: &ScheduleRequest)
    -> Result<ScheduleResponse, AgentError>;

    async fn triage(&self, request: &TriageRequest) -> Result<TriageDecision, AgentError>;

    async fn plan_discharges(
        &self,
        request: &DischargePlanningRequest,
    ) -> Result<DischargePlanningResponse, AgentError>;

    async fn schedule_or(&self, cases: &[SurgicalCase]) -> Result<OrScheduleResponse, AgentError>;

    async fn probe(&self, service: AgentService) -> bool;
}
