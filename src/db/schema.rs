use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use surrealdb::{RecordId, sql::Datetime};

use crate::agents::VitalSigns;

/// Persisted representation of a staff roster entry (table: `staff`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffRecord {
    pub id: RecordId,
    /// Stable external identifier, unique across the roster.
    pub staff_id: String,
    pub name: String,
    pub role: String,
    pub max_hours_per_week: u32,
    pub qualifications: Vec<String>,
    /// Only active staff are eligible for scheduling.
    pub active: bool,
    pub created_at: Option<Datetime>,
}

/// Payload used when inserting a staff member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffCreate {
    pub staff_id: String,
    pub name: String,
    pub role: String,
    pub max_hours_per_week: u32,
    pub qualifications: Vec<String>,
    pub active: bool,
}

/// Persisted representation of an admitted patient (table: `inpatient`).
///
/// Rows are owned by the external patient-record store; the orchestrator
/// reads the open stays (no discharge date) for discharge planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InpatientRecord {
    pub id: RecordId,
    pub patient_id: String,
    pub admission_date: String,
    pub diagnosis: String,
    #[serde(default)]
    pub vitals: VitalSigns,
    #[serde(default)]
    pub procedures_completed: Vec<String>,
    pub discharge_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InpatientCreate {
    pub patient_id: String,
    pub admission_date: String,
    pub diagnosis: String,
    pub vitals: VitalSigns,
    pub procedures_completed: Vec<String>,
    pub discharge_date: Option<String>,
}

/// One forecast point (table: `forecast`), unique per `(date, generated_at)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub id: RecordId,
    pub date: String,
    pub predicted_volume: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
    pub model_version: String,
    /// Timestamp the forecasting service stamped on the whole response.
    pub generated_at: String,
    pub created_at: Option<Datetime>,
}

/// One staff-date-shift assignment (table: `schedule_assignment`).
/// Append-only; repeated runs accumulate history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAssignmentRecord {
    pub id: RecordId,
    pub staff_id: String,
    pub date: String,
    pub shift: String,
    pub role: String,
    pub created_at: Option<Datetime>,
}

/// Persisted triage outcome (table: `triage_decision`). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageDecisionRecord {
    pub id: RecordId,
    pub patient_id: String,
    pub acuity_level: u8,
    pub acuity_label: String,
    pub confidence: f64,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    pub recommended_action: String,
    pub model_version: String,
    pub created_at: Option<Datetime>,
}

/// Lifecycle of an ER queue entry. Transitions past `waiting` are driven
/// by collaborators outside this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Waiting,
    Seen,
    Discharged,
}

/// One ER queue entry (table: `er_queue`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErQueueRecord {
    pub id: RecordId,
    pub patient_id: String,
    pub acuity_level: u8,
    pub arrival_time: Datetime,
    pub status: QueueStatus,
    pub seen_at: Option<Datetime>,
}

/// Persisted discharge-planning output (table: `discharge_recommendation`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeRecommendationRecord {
    pub id: RecordId,
    pub patient_id: String,
    pub discharge_readiness_score: f64,
    pub estimated_discharge_date: String,
    #[serde(default)]
    pub criteria_met: BTreeMap<String, bool>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub created_at: Option<Datetime>,
}

/// One scheduled OR case (table: `or_schedule`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrScheduleRecord {
    pub id: RecordId,
    pub case_id: String,
    pub or_room: u32,
    pub start_time: String,
    pub estimated_duration: u32,
    pub created_at: Option<Datetime>,
}
