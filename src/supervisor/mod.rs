//! The orchestration core: sequences the fixed set of workflows, decides
//! which failures are tolerable, and drives persistence.
//!
//! Decision logic lives in the external agents; everything here is
//! control flow, failure policy, and bookkeeping.

pub mod scheduler;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{
    AgentService, DecisionServices, DischargeCandidate, DischargePlanningRequest, ForecastRequest,
    ForecastResponse, InpatientSnapshot, MinStaffPerShift, OrAssignment, ScheduleConstraints,
    ScheduleRequest, ShiftAssignment, StaffMember, SurgicalCase, TriageDecision, TriageRequest,
};
use crate::config::{OrchestratorConfig, TriagePolicy, WorkflowConfig};
use crate::db::{InpatientRecord, Store};
use crate::error::{AgentError, StoreError};

/// Transient cache of the most recent workflow outputs.
///
/// Overwritten wholesale on each successful stage, reset on restart, and
/// never persisted: the store is authoritative, this exists only so the
/// status surface has something to show between runs.
#[derive(Debug, Default, Clone)]
pub struct WorkflowState {
    pub last_forecast: Option<ForecastResponse>,
    pub last_schedule: Vec<ShiftAssignment>,
    pub last_discharge_plan: Vec<DischargeCandidate>,
    pub last_daily_run_at: Option<DateTime<Utc>>,
}

/// Immutable outcome of one daily pipeline invocation, returned directly
/// to the caller so nothing needs to read the shared state afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct DailyRunReport {
    pub run_id: Uuid,
    pub forecast: Option<ForecastResponse>,
    pub schedule: Vec<ShiftAssignment>,
    pub discharge_candidates: Vec<DischargeCandidate>,
}

/// Counters behind the tolerated-failure policy. Tolerated losses are
/// deliberate, but they must be observable.
#[derive(Debug, Default)]
pub struct SupervisorMetrics {
    tolerated_agent_failures: AtomicU64,
    fatal_agent_failures: AtomicU64,
    persistence_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub tolerated_agent_failures: u64,
    pub fatal_agent_failures: u64,
    pub persistence_failures: u64,
}

impl SupervisorMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tolerated_agent_failures: self.tolerated_agent_failures.load(Ordering::Relaxed),
            fatal_agent_failures: self.fatal_agent_failures.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot served by the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub last_daily_run_at: Option<DateTime<Utc>>,
    pub forecast: Option<ForecastResponse>,
    pub schedule: Vec<ShiftAssignment>,
    pub discharge_plan: Vec<DischargeCandidate>,
    pub metrics: MetricsSnapshot,
}

/// Supervises the fixed set of hospital workflows.
pub struct Supervisor {
    store: Store,
    agents: Arc<dyn DecisionServices>,
    workflow: WorkflowConfig,
    triage_policy: TriagePolicy,
    state: RwLock<WorkflowState>,
    metrics: SupervisorMetrics,
    // One lock per named workflow: overlapping triggers queue instead of
    // racing on the shared state. Arrival handling takes neither; it only
    // appends rows.
    daily_lock: Mutex<()>,
    discharge_lock: Mutex<()>,
}

impl Supervisor {
    pub fn new(store: Store, agents: Arc<dyn DecisionServices>, config: &OrchestratorConfig) -> Self {
        Self {
            store,
            agents,
            workflow: config.workflow.clone(),
            triage_policy: config.triage.clone(),
            state: RwLock::new(WorkflowState::default()),
            metrics: SupervisorMetrics::default(),
            daily_lock: Mutex::new(()),
            discharge_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn metrics(&self) -> &SupervisorMetrics {
        &self.metrics
    }

    /// The daily pipeline: forecast, then staffing (only with a forecast
    /// in hand), then discharge planning unconditionally. Every stage
    /// failure is tolerated; the terminal state is always reached.
    pub async fn run_daily_workflow(&self) -> DailyRunReport {
        let _guard = self.daily_lock.lock().await;
        let run_id = Uuid::new_v4();
        info!("daily workflow starting (run {run_id})");

        let forecast = self.run_forecast_stage().await;

        let schedule = match &forecast {
            Some(forecast) => self.run_scheduling_stage(forecast).await,
            None => {
                info!("skipping scheduling stage: no forecast available");
                Vec::new()
            }
        };

        let discharge_candidates = self.run_discharge_stage().await;

        self.state.write().await.last_daily_run_at = Some(Utc::now());
        info!(
            "daily workflow finished (run {run_id}): forecast={}, assignments={}, discharge_candidates={}",
            forecast.is_some(),
            schedule.len(),
            discharge_candidates.len()
        );

        DailyRunReport {
            run_id,
            forecast,
            schedule,
            discharge_candidates,
        }
    }

    /// Discharge planning on its own, as triggered by the six-hour job.
    pub async fn run_discharge_planning(&self) -> Vec<DischargeCandidate> {
        let _guard = self.discharge_lock.lock().await;
        self.run_discharge_stage().await
    }

    async fn run_forecast_stage(&self) -> Option<ForecastResponse> {
        let request = ForecastRequest {
            horizon_days: self.workflow.forecast_horizon_days,
            date: Utc::now().format("%Y-%m-%d").to_string(),
        };

        let response = match self.agents.forecast(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.note_tolerated_failure("forecast stage", &e);
                return None;
            }
        };

        self.state.write().await.last_forecast = Some(response.clone());

        for point in &response.predictions {
            if !point.bounds_consistent() {
                warn!(
                    "forecast point for {} has inconsistent bounds: {} outside [{}, {}]",
                    point.date,
                    point.predicted_volume,
                    point.confidence_lower,
                    point.confidence_upper
                );
            }
            if let Err(e) = self
                .store
                .upsert_forecast_point(point, &response.model_version, &response.generated_at)
                .await
            {
                self.note_persistence_failure("forecast point", &e);
            }
        }

        Some(response)
    }

    async fn run_scheduling_stage(&self, forecast: &ForecastResponse) -> Vec<ShiftAssignment> {
        let staff = match self.store.active_staff().await {
            Ok(staff) => staff,
            Err(e) => {
                self.note_persistence_failure("active staff roster", &e);
                warn!("skipping scheduling stage: staff roster unavailable");
                return Vec::new();
            }
        };

        let request = ScheduleRequest {
            forecast_data: Some(forecast.clone()),
            staff_list: staff
                .into_iter()
                .map(|s| StaffMember {
                    staff_id: s.staff_id,
                    name: s.name,
                    role: s.role,
                    max_hours_per_week: s.max_hours_per_week,
                    qualifications: s.qualifications,
                })
                .collect(),
            constraints: ScheduleConstraints {
                min_staff_per_shift: MinStaffPerShift {
                    morning: self.workflow.min_staff_morning,
                    afternoon: self.workflow.min_staff_afternoon,
                    night: self.workflow.min_staff_night,
                },
                shift_duration_hours: self.workflow.shift_duration_hours,
            },
        };

        let response = match self.agents.plan_schedule(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.note_tolerated_failure("scheduling stage", &e);
                return Vec::new();
            }
        };

        self.state.write().await.last_schedule = response.schedule.clone();

        for assignment in &response.schedule {
            if let Err(e) = self.store.insert_schedule_assignment(assignment).await {
                self.note_persistence_failure("schedule assignment", &e);
            }
        }

        response.schedule
    }

    async fn run_discharge_stage(&self) -> Vec<DischargeCandidate> {
        let inpatients = match self.store.open_inpatients().await {
            Ok(inpatients) => inpatients,
            Err(e) => {
                self.note_persistence_failure("open inpatients", &e);
                warn!("skipping discharge stage: inpatient census unavailable");
                return Vec::new();
            }
        };

        let request = DischargePlanningRequest {
            current_patients: inpatients.iter().map(InpatientSnapshot::from).collect(),
        };

        let response = match self.agents.plan_discharges(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.note_tolerated_failure("discharge stage", &e);
                return Vec::new();
            }
        };

        self.state.write().await.last_discharge_plan = response.discharge_candidates.clone();

        for candidate in &response.discharge_candidates {
            if let Err(e) = self.store.insert_discharge_recommendation(candidate).await {
                self.note_persistence_failure("discharge recommendation", &e);
            }
        }

        response.discharge_candidates
    }

    /// Triage one arriving patient.
    ///
    /// The triage call itself is fatal on failure: there is no safe
    /// default acuity, so the error goes back to the caller and nothing
    /// is written. Once a decision exists, persistence is best-effort and
    /// the decision is returned regardless.
    pub async fn handle_arrival(
        &self,
        request: &TriageRequest,
    ) -> Result<TriageDecision, AgentError> {
        let decision = match self.agents.triage(request).await {
            Ok(decision) => decision,
            Err(e) => {
                self.metrics.fatal_agent_failures.fetch_add(1, Ordering::Relaxed);
                error!("triage failed for patient {}: {}", request.patient_id, e);
                return Err(e);
            }
        };

        info!(
            "triage for patient {}: level {} ({})",
            decision.patient_id, decision.acuity_level, decision.acuity_label
        );

        if let Err(e) = self.store.insert_triage_decision(&decision).await {
            self.note_persistence_failure("triage decision", &e);
        }

        if self.triage_policy.requires_er_queue(decision.acuity_level) {
            match self
                .store
                .insert_er_queue_entry(&decision.patient_id, decision.acuity_level)
                .await
            {
                Ok(_) => info!("patient {} queued for the ER", decision.patient_id),
                Err(e) => self.note_persistence_failure("er queue entry", &e),
            }
        }

        Ok(decision)
    }

    /// Probe every known decision service. Never fails: an unreachable
    /// service reads as `false`, and the map always covers all services.
    pub async fn check_agent_health(&self) -> BTreeMap<&'static str, bool> {
        let (forecast, staffing, triage, discharge, eror) = tokio::join!(
            self.agents.probe(AgentService::DemandForecast),
            self.agents.probe(AgentService::StaffScheduling),
            self.agents.probe(AgentService::Triage),
            self.agents.probe(AgentService::DischargePlanning),
            self.agents.probe(AgentService::ErOrScheduling),
        );

        BTreeMap::from([
            (AgentService::DemandForecast.name(), forecast),
            (AgentService::StaffScheduling.name(), staffing),
            (AgentService::Triage.name(), triage),
            (AgentService::DischargePlanning.name(), discharge),
            (AgentService::ErOrScheduling.name(), eror),
        ])
    }

    /// Schedule a batch of surgical cases. Fatal on agent failure: there
    /// is no later stage to absorb it.
    pub async fn schedule_or_cases(
        &self,
        cases: &[SurgicalCase],
    ) -> Result<Vec<OrAssignment>, AgentError> {
        let response = match self.agents.schedule_or(cases).await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.fatal_agent_failures.fetch_add(1, Ordering::Relaxed);
                error!("or scheduling failed for {} cases: {}", cases.len(), e);
                return Err(e);
            }
        };

        for assignment in &response.schedule {
            if let Err(e) = self.store.insert_or_assignment(assignment).await {
                self.note_persistence_failure("or schedule assignment", &e);
            }
        }

        Ok(response.schedule)
    }

    pub async fn status(&self) -> StatusSnapshot {
        let state = self.state.read().await;
        StatusSnapshot {
            last_daily_run_at: state.last_daily_run_at,
            forecast: state.last_forecast.clone(),
            schedule: state.last_schedule.clone(),
            discharge_plan: state.last_discharge_plan.clone(),
            metrics: self.metrics.snapshot(),
        }
    }

    fn note_tolerated_failure(&self, stage: &str, err: &AgentError) {
        self.metrics
            .tolerated_agent_failures
            .fetch_add(1, Ordering::Relaxed);
        warn!("{stage} yielded nothing: {err}");
    }

    fn note_persistence_failure(&self, what: &str, err: &StoreError) {
        self.metrics
            .persistence_failures
            .fetch_add(1, Ordering::Relaxed);
        warn!("failed to persist {what}: {err}");
    }
}

impl From<&InpatientRecord> for InpatientSnapshot {
    fn from(record: &InpatientRecord) -> Self {
        InpatientSnapshot {
            patient_id: record.patient_id.clone(),
            admission_date: record.admission_date.clone(),
            diagnosis: record.diagnosis.clone(),
            vitals: record.vitals.clone(),
            procedures_completed: record.procedures_completed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{
        DischargePlanningResponse, ForecastPoint, OrScheduleResponse, ScheduleResponse, VitalSigns,
    };
    use crate::db::{DatabaseConfig, InpatientCreate, QueueStatus, StaffCreate, create_connection, ensure_schema};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Scripted stand-in for the five agents: each capability can be told
    /// to fail, every call is counted, and the staffing request's roster
    /// is captured for inspection.
    #[derive(Default)]
    struct MockAgents {
        fail_forecast: bool,
        fail_schedule: bool,
        fail_triage: bool,
        fail_discharge: bool,
        fail_or: bool,
        unhealthy: Vec<&'static str>,
        triage_acuity: u8,
        forecast_calls: AtomicUsize,
        schedule_calls: AtomicUsize,
        discharge_calls: AtomicUsize,
        or_calls: AtomicUsize,
        seen_staff_ids: std::sync::Mutex<Vec<String>>,
    }

    impl MockAgents {
        fn failing(service: AgentService) -> AgentError {
            AgentError::Timeout {
                service: service.name(),
            }
        }
    }

    #[async_trait]
    impl DecisionServices for MockAgents {
        async fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResponse, AgentError> {
            self.forecast_calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_forecast {
                return Err(Self::failing(AgentService::DemandForecast));
            }
            Ok(ForecastResponse {
                predictions: (0..request.horizon_days)
                    .map(|i| ForecastPoint {
                        date: format!("2026-03-{:02}", i + 1),
                        predicted_volume: 100.0 + i as f64,
                        confidence_lower: 90.0,
                        confidence_upper: 120.0,
                    })
                    .collect(),
                model_version: "v1.0".to_string(),
                generated_at: "2026-03-01T06:00:00".to_string(),
            })
        }

        async fn plan_schedule(
            &self,
            request: &ScheduleRequest,
        ) -> Result<ScheduleResponse, AgentError> {
            self.schedule_calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_schedule {
                return Err(Self::failing(AgentService::StaffScheduling));
            }
            let mut seen = self.seen_staff_ids.lock().unwrap();
            *seen = request.staff_list.iter().map(|s| s.staff_id.clone()).collect();
            Ok(ScheduleResponse {
                schedule: request
                    .staff_list
                    .iter()
                    .map(|s| ShiftAssignment {
                        staff_id: s.staff_id.clone(),
                        date: "2026-03-01".to_string(),
                        shift: "morning".to_string(),
                        role: s.role.clone(),
                    })
                    .collect(),
            })
        }

        async fn triage(&self, request: &TriageRequest) -> Result<TriageDecision, AgentError> {
            if self.fail_triage {
                return Err(Self::failing(AgentService::Triage));
            }
            Ok(TriageDecision {
                patient_id: request.patient_id.clone(),
                acuity_level: self.triage_acuity,
                acuity_label: "Urgent".to_string(),
                confidence: 0.9,
                risk_factors: vec![],
                red_flags: vec![],
                recommended_action: "assess promptly".to_string(),
                model_version: "v1.0".to_string(),
            })
        }

        async fn plan_discharges(
            &self,
            request: &DischargePlanningRequest,
        ) -> Result<DischargePlanningResponse, AgentError> {
            self.discharge_calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_discharge {
                return Err(Self::failing(AgentService::DischargePlanning));
            }
            Ok(DischargePlanningResponse {
                discharge_candidates: request
                    .current_patients
                    .iter()
                    .map(|p| DischargeCandidate {
                        patient_id: p.patient_id.clone(),
                        discharge_readiness_score: 0.8,
                        estimated_discharge_date: "2026-03-03".to_string(),
                        criteria_met: BTreeMap::new(),
                        recommendations: vec!["follow-up in 7 days".to_string()],
                    })
                    .collect(),
                generated_at: "2026-03-01T06:05:00".to_string(),
            })
        }

        async fn schedule_or(
            &self,
            cases: &[SurgicalCase],
        ) -> Result<OrScheduleResponse, AgentError> {
            self.or_calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_or {
                return Err(Self::failing(AgentService::ErOrScheduling));
            }
            Ok(OrScheduleResponse {
                schedule: cases
                    .iter()
                    .enumerate()
                    .map(|(i, c)| OrAssignment {
                        case_id: c.case_id.clone(),
                        or_room: (i + 1) as u32,
                        start_time: "2026-03-01T08:00:00".to_string(),
                        estimated_duration: c.estimated_duration.unwrap_or(90),
                    })
                    .collect(),
            })
        }

        async fn probe(&self, service: AgentService) -> bool {
            !self.unhealthy.contains(&service.name())
        }
    }

    async fn memory_store(name: &str) -> Store {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            namespace: "careflow_test".to_string(),
            database: name.to_string(),
            username: None,
            password: None,
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        Store::new(db)
    }

    async fn supervisor_with(name: &str, agents: MockAgents) -> (Supervisor, Arc<MockAgents>) {
        let store = memory_store(name).await;
        let agents = Arc::new(agents);
        let config = OrchestratorConfig::default();
        let shared: Arc<dyn DecisionServices> = agents.clone();
        (Supervisor::new(store, shared, &config), agents)
    }

    async fn seed_roster_and_census(store: &Store) {
        store
            .insert_staff(&StaffCreate {
                staff_id: "S-1".to_string(),
                name: "Asha Rao".to_string(),
                role: "nurse".to_string(),
                max_hours_per_week: 40,
                qualifications: vec!["ER".to_string()],
                active: true,
            })
            .await
            .unwrap();
        store
            .insert_inpatient(&InpatientCreate {
                patient_id: "P-10".to_string(),
                admission_date: "2026-02-25".to_string(),
                diagnosis: "appendectomy recovery".to_string(),
                vitals: VitalSigns::default(),
                procedures_completed: vec!["appendectomy".to_string()],
                discharge_date: None,
            })
            .await
            .unwrap();
    }

    fn arrival(patient_id: &str) -> TriageRequest {
        TriageRequest {
            patient_id: patient_id.to_string(),
            symptoms: "shortness of breath".to_string(),
            vitals: VitalSigns {
                oxygen_saturation: Some(91),
                ..Default::default()
            },
            age: Some(58),
            medical_history: None,
        }
    }

    #[tokio::test]
    async fn daily_run_persists_every_stage() {
        let (supervisor, _agents) = supervisor_with(
            "daily_ok",
            MockAgents {
                triage_acuity: 3,
                ..Default::default()
            },
        )
        .await;
        seed_roster_and_census(supervisor.store()).await;

        let report = supervisor.run_daily_workflow().await;

        assert!(report.forecast.is_some());
        assert_eq!(report.schedule.len(), 1);
        assert_eq!(report.discharge_candidates.len(), 1);

        let store = supervisor.store();
        assert_eq!(store.forecast_points().await.unwrap().len(), 7);
        assert_eq!(store.schedule_assignments().await.unwrap().len(), 1);
        assert_eq!(store.discharge_recommendations().await.unwrap().len(), 1);

        let status = supervisor.status().await;
        assert!(status.last_daily_run_at.is_some());
        assert_eq!(status.schedule.len(), 1);
    }

    #[tokio::test]
    async fn forecast_failure_skips_scheduling_but_discharge_still_runs() {
        let (supervisor, agents) = supervisor_with(
            "daily_forecast_down",
            MockAgents {
                fail_forecast: true,
                ..Default::default()
            },
        )
        .await;
        seed_roster_and_census(supervisor.store()).await;

        let report = supervisor.run_daily_workflow().await;

        assert!(report.forecast.is_none());
        assert!(report.schedule.is_empty());
        assert_eq!(agents.schedule_calls.load(Ordering::Relaxed), 0);
        assert_eq!(agents.discharge_calls.load(Ordering::Relaxed), 1);
        assert_eq!(report.discharge_candidates.len(), 1);

        let store = supervisor.store();
        assert!(store.forecast_points().await.unwrap().is_empty());
        assert_eq!(store.discharge_recommendations().await.unwrap().len(), 1);
        assert_eq!(supervisor.metrics().snapshot().tolerated_agent_failures, 1);
    }

    #[tokio::test]
    async fn scheduling_failure_is_tolerated_and_pipeline_finishes() {
        let (supervisor, agents) = supervisor_with(
            "daily_scheduling_down",
            MockAgents {
                fail_schedule: true,
                ..Default::default()
            },
        )
        .await;
        seed_roster_and_census(supervisor.store()).await;

        let report = supervisor.run_daily_workflow().await;

        assert!(report.forecast.is_some());
        assert!(report.schedule.is_empty());
        assert_eq!(agents.discharge_calls.load(Ordering::Relaxed), 1);
        assert!(supervisor.store().schedule_assignments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheduling_request_carries_only_active_staff() {
        let (supervisor, agents) =
            supervisor_with("daily_active_only", MockAgents::default()).await;
        seed_roster_and_census(supervisor.store()).await;
        supervisor
            .store()
            .insert_staff(&StaffCreate {
                staff_id: "S-2".to_string(),
                name: "On Leave".to_string(),
                role: "nurse".to_string(),
                max_hours_per_week: 40,
                qualifications: vec![],
                active: false,
            })
            .await
            .unwrap();

        supervisor.run_daily_workflow().await;

        let seen = agents.seen_staff_ids.lock().unwrap().clone();
        assert_eq!(seen, vec!["S-1".to_string()]);
    }

    #[tokio::test]
    async fn urgent_arrival_is_queued_exactly_once() {
        let (supervisor, _agents) = supervisor_with(
            "arrival_urgent",
            MockAgents {
                triage_acuity: 3,
                ..Default::default()
            },
        )
        .await;

        let before = Utc::now();
        let decision = supervisor.handle_arrival(&arrival("P-50")).await.unwrap();
        assert_eq!(decision.acuity_level, 3);

        let entries = supervisor.store().er_queue_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].patient_id, "P-50");
        assert_eq!(entries[0].status, QueueStatus::Waiting);
        let arrival_time: DateTime<Utc> = entries[0].arrival_time.0;
        assert!(arrival_time >= before - chrono::Duration::seconds(1));
        assert!(arrival_time <= Utc::now() + chrono::Duration::seconds(1));

        assert_eq!(supervisor.store().triage_decisions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn low_acuity_arrival_is_recorded_but_not_queued() {
        let (supervisor, _agents) = supervisor_with(
            "arrival_low",
            MockAgents {
                triage_acuity: 4,
                ..Default::default()
            },
        )
        .await;

        supervisor.handle_arrival(&arrival("P-51")).await.unwrap();

        assert!(supervisor.store().er_queue_entries().await.unwrap().is_empty());
        assert_eq!(supervisor.store().triage_decisions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn triage_failure_propagates_and_writes_nothing() {
        let (supervisor, _agents) = supervisor_with(
            "arrival_down",
            MockAgents {
                fail_triage: true,
                ..Default::default()
            },
        )
        .await;

        let err = supervisor.handle_arrival(&arrival("P-52")).await.unwrap_err();
        assert_eq!(err.service(), "triage");

        assert!(supervisor.store().triage_decisions().await.unwrap().is_empty());
        assert!(supervisor.store().er_queue_entries().await.unwrap().is_empty());
        assert_eq!(supervisor.metrics().snapshot().fatal_agent_failures, 1);
    }

    #[tokio::test]
    async fn or_scheduling_persists_on_success_and_writes_nothing_on_failure() {
        let cases = vec![SurgicalCase {
            case_id: "C-1".to_string(),
            procedure_type: "cholecystectomy".to_string(),
            estimated_duration: Some(120),
            priority: Some(1),
        }];

        let (supervisor, _agents) = supervisor_with("or_ok", MockAgents::default()).await;
        let assignments = supervisor.schedule_or_cases(&cases).await.unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(supervisor.store().or_assignments().await.unwrap().len(), 1);

        let (supervisor, _agents) = supervisor_with(
            "or_down",
            MockAgents {
                fail_or: true,
                ..Default::default()
            },
        )
        .await;
        supervisor.schedule_or_cases(&cases).await.unwrap_err();
        assert!(supervisor.store().or_assignments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_check_covers_every_service_and_never_fails() {
        let (supervisor, _agents) = supervisor_with(
            "health_degraded",
            MockAgents {
                unhealthy: vec!["triage"],
                ..Default::default()
            },
        )
        .await;

        let health = supervisor.check_agent_health().await;

        assert_eq!(health.len(), AgentService::ALL.len());
        assert_eq!(health["triage"], false);
        assert_eq!(health["demand_forecast"], true);
    }

    #[tokio::test]
    async fn disabled_scheduler_registers_no_jobs() {
        let (supervisor, _agents) = supervisor_with("sched_disabled", MockAgents::default()).await;
        let supervisor = Arc::new(supervisor);

        let scheduler = scheduler::JobScheduler::new();
        let config = crate::config::SchedulerConfig {
            enabled: false,
            ..Default::default()
        };

        scheduler.start(&config, supervisor).await;
        assert!(scheduler.job_names().await.is_empty());
    }

    #[tokio::test]
    async fn enabled_scheduler_registers_the_full_timetable() {
        let (supervisor, _agents) = supervisor_with("sched_enabled", MockAgents::default()).await;
        let supervisor = Arc::new(supervisor);

        let scheduler = scheduler::JobScheduler::new();
        scheduler
            .start(&crate::config::SchedulerConfig::default(), supervisor)
            .await;

        assert_eq!(
            scheduler.job_names().await,
            vec![
                scheduler::DAILY_WORKFLOW_JOB.to_string(),
                scheduler::DISCHARGE_CHECK_JOB.to_string(),
                scheduler::HEALTH_CHECK_JOB.to_string(),
            ]
        );

        scheduler.stop_all().await;
    }

    #[tokio::test]
    async fn standalone_discharge_planning_persists_candidates() {
        let (supervisor, agents) =
            supervisor_with("discharge_standalone", MockAgents::default()).await;
        seed_roster_and_census(supervisor.store()).await;

        let candidates = supervisor.run_discharge_planning().await;

        assert_eq!(candidates.len(), 1);
        assert_eq!(agents.discharge_calls.load(Ordering::Relaxed), 1);
        assert_eq!(
            supervisor.store().discharge_recommendations().await.unwrap().len(),
            1
        );
    }
}
