// Persistence gateway over SurrealDB.
//
// Every write here is an independent statement: workflow stages persist
// row by row so one bad record cannot sink a whole batch. Only forecast
// points carry upsert semantics; everything else appends and the
// accumulated history is the audit trail.

use surrealdb::sql::Datetime;

use crate::agents::{
    DischargeCandidate, ForecastPoint, OrAssignment, ShiftAssignment, TriageDecision,
};
use crate::db::connection::Db;
use crate::db::schema::*;
use crate::error::StoreError;

#[derive(Clone)]
pub struct Store {
    db: Db,
}

impl Store {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Upsert one forecast point keyed by `(date, generated_at)`.
    ///
    /// A conflicting row keeps its identity and takes the new volume and
    /// bounds; a fresh `generated_at` starts a new row, so successive
    /// forecast runs remain distinguishable.
    pub async fn upsert_forecast_point(
        &self,
        point: &ForecastPoint,
        model_version: &str,
        generated_at: &str,
    ) -> Result<ForecastRecord, StoreError> {
        let mut res = self
            .db
            .query(
                r#"
                UPDATE forecast SET
                    predicted_volume = $predicted_volume,
                    confidence_lower = $confidence_lower,
                    confidence_upper = $confidence_upper,
                    model_version = $model_version
                WHERE date = $date AND generated_at = $generated_at
                "#,
            )
            .bind(("predicted_volume", point.predicted_volume))
            .bind(("confidence_lower", point.confidence_lower))
            .bind(("confidence_upper", point.confidence_upper))
            .bind(("model_version", model_version.to_string()))
            .bind(("date", point.date.clone()))
            .bind(("generated_at", generated_at.to_string()))
            .await?;

        let updated: Vec<ForecastRecord> = res.take(0)?;
        if let Some(record) = updated.into_iter().next() {
            return Ok(record);
        }

        let mut res = self
            .db
            .query(
                r#"
                CREATE forecast SET
                    date = $date,
                    predicted_volume = $predicted_volume,
                    confidence_lower = $confidence_lower,
                    confidence_upper = $confidence_upper,
                    model_version = $model_version,
                    generated_at = $generated_at
                "#,
            )
            .bind(("date", point.date.clone()))
            .bind(("predicted_volume", point.predicted_volume))
            .bind(("confidence_lower", point.confidence_lower))
            .bind(("confidence_upper", point.confidence_upper))
            .bind(("model_version", model_version.to_string()))
            .bind(("generated_at", generated_at.to_string()))
            .await?;

        let created: Option<ForecastRecord> = res.take(0)?;
        created.ok_or(StoreError::MissingRecord {
            operation: "upsert_forecast_point",
        })
    }

    pub async fn insert_schedule_assignment(
        &self,
        assignment: &ShiftAssignment,
    ) -> Result<ScheduleAssignmentRecord, StoreError> {
        let mut res = self
            .db
            .query(
                r#"
                CREATE schedule_assignment SET
                    staff_id = $staff_id,
                    date = $date,
                    shift = $shift,
                    role = $role
                "#,
            )
            .bind(("staff_id", assignment.staff_id.clone()))
            .bind(("date", assignment.date.clone()))
            .bind(("shift", assignment.shift.clone()))
            .bind(("role", assignment.role.clone()))
            .await?;

        let created: Option<ScheduleAssignmentRecord> = res.take(0)?;
        created.ok_or(StoreError::MissingRecord {
            operation: "insert_schedule_assignment",
        })
    }

    pub async fn insert_triage_decision(
        &self,
        decision: &TriageDecision,
    ) -> Result<TriageDecisionRecord, StoreError> {
        let mut res = self
            .db
            .query(
                r#"
                CREATE triage_decision SET
                    patient_id = $patient_id,
                    acuity_level = $acuity_level,
                    acuity_label = $acuity_label,
                    confidence = $confidence,
                    risk_factors = $risk_factors,
                    red_flags = $red_flags,
                    recommended_action = $recommended_action,
                    model_version = $model_version
                "#,
            )
            .bind(("patient_id", decision.patient_id.clone()))
            .bind(("acuity_level", decision.acuity_level as i64))
            .bind(("acuity_label", decision.acuity_label.clone()))
            .bind(("confidence", decision.confidence))
            .bind(("risk_factors", decision.risk_factors.clone()))
            .bind(("red_flags", decision.red_flags.clone()))
            .bind(("recommended_action", decision.recommended_action.clone()))
            .bind(("model_version", decision.model_version.clone()))
            .await?;

        let created: Option<TriageDecisionRecord> = res.take(0)?;
        created.ok_or(StoreError::MissingRecord {
            operation: "insert_triage_decision",
        })
    }

    /// Insert a `waiting` queue entry stamped with the moment of insertion.
    pub async fn insert_er_queue_entry(
        &self,
        patient_id: &str,
        acuity_level: u8,
    ) -> Result<ErQueueRecord, StoreError> {
        let mut res = self
            .db
            .query(
                r#"
                CREATE er_queue SET
                    patient_id = $patient_id,
                    acuity_level = $acuity_level,
                    arrival_time = time::now(),
                    status = 'waiting',
                    seen_at = NONE
                "#,
            )
            .bind(("patient_id", patient_id.to_string()))
            .bind(("acuity_level", acuity_level as i64))
            .await?;

        let created: Option<ErQueueRecord> = res.take(0)?;
        created.ok_or(StoreError::MissingRecord {
            operation: "insert_er_queue_entry",
        })
    }

    pub async fn insert_discharge_recommendation(
        &self,
        candidate: &DischargeCandidate,
    ) -> Result<DischargeRecommendationRecord, StoreError> {
        let mut res = self
            .db
            .query(
                r#"
                CREATE discharge_recommendation SET
                    patient_id = $patient_id,
                    discharge_readiness_score = $discharge_readiness_score,
                    estimated_discharge_date = $estimated_discharge_date,
                    criteria_met = $criteria_met,
                    recommendations = $recommendations
                "#,
            )
            .bind(("patient_id", candidate.patient_id.clone()))
            .bind(("discharge_readiness_score", candidate.discharge_readiness_score))
            .bind(("estimated_discharge_date", candidate.estimated_discharge_date.clone()))
            .bind(("criteria_met", candidate.criteria_met.clone()))
            .bind(("recommendations", candidate.recommendations.clone()))
            .await?;

        let created: Option<DischargeRecommendationRecord> = res.take(0)?;
        created.ok_or(StoreError::MissingRecord {
            operation: "insert_discharge_recommendation",
        })
    }

    pub async fn insert_or_assignment(
        &self,
        assignment: &OrAssignment,
    ) -> Result<OrScheduleRecord, StoreError> {
        let mut res = self
            .db
            .query(
                r#"
                CREATE or_schedule SET
                    case_id = $case_id,
                    or_room = $or_room,
                    start_time = $start_time,
                    estimated_duration = $estimated_duration
                "#,
            )
            .bind(("case_id", assignment.case_id.clone()))
            .bind(("or_room", assignment.or_room as i64))
            .bind(("start_time", assignment.start_time.clone()))
            .bind(("estimated_duration", assignment.estimated_duration as i64))
            .await?;

        let created: Option<OrScheduleRecord> = res.take(0)?;
        created.ok_or(StoreError::MissingRecord {
            operation: "insert_or_assignment",
        })
    }

    pub async fn insert_staff(&self, staff: &StaffCreate) -> Result<StaffRecord, StoreError> {
        let mut res = self
            .db
            .query(
                r#"
                CREATE staff SET
                    staff_id = $staff_id,
                    name = $name,
                    role = $role,
                    max_hours_per_week = $max_hours_per_week,
                    qualifications = $qualifications,
                    active = $active
                "#,
            )
            .bind(("staff_id", staff.staff_id.clone()))
            .bind(("name", staff.name.clone()))
            .bind(("role", staff.role.clone()))
            .bind(("max_hours_per_week", staff.max_hours_per_week as i64))
            .bind(("qualifications", staff.qualifications.clone()))
            .bind(("active", staff.active))
            .await?;

        let created: Option<StaffRecord> = res.take(0)?;
        created.ok_or(StoreError::MissingRecord {
            operation: "insert_staff",
        })
    }

    pub async fn insert_inpatient(
        &self,
        inpatient: &InpatientCreate,
    ) -> Result<InpatientRecord, StoreError> {
        let mut res = self
            .db
            .query(
                r#"
                CREATE inpatient SET
                    patient_id = $patient_id,
                    admission_date = $admission_date,
                    diagnosis = $diagnosis,
                    vitals = $vitals,
                    procedures_completed = $procedures_completed,
                    discharge_date = $discharge_date
                "#,
            )
            .bind(("patient_id", inpatient.patient_id.clone()))
            .bind(("admission_date", inpatient.admission_date.clone()))
            .bind(("diagnosis", inpatient.diagnosis.clone()))
            .bind(("vitals", inpatient.vitals.clone()))
            .bind(("procedures_completed", inpatient.procedures_completed.clone()))
            .bind(("discharge_date", inpatient.discharge_date.clone()))
            .await?;

        let created: Option<InpatientRecord> = res.take(0)?;
        created.ok_or(StoreError::MissingRecord {
            operation: "insert_inpatient",
        })
    }

    /// Staff eligible for scheduling.
    pub async fn active_staff(&self) -> Result<Vec<StaffRecord>, StoreError> {
        let mut res = self
            .db
            .query("SELECT * FROM staff WHERE active = true")
            .await?;
        let staff: Vec<StaffRecord> = res.take(0)?;
        Ok(staff)
    }

    /// Admitted patients with no discharge date yet.
    pub async fn open_inpatients(&self) -> Result<Vec<InpatientRecord>, StoreError> {
        let mut res = self
            .db
            .query("SELECT * FROM inpatient WHERE discharge_date IS NONE")
            .await?;
        let inpatients: Vec<InpatientRecord> = res.take(0)?;
        Ok(inpatients)
    }

    pub async fn forecast_points(&self) -> Result<Vec<ForecastRecord>, StoreError> {
        let mut res = self
            .db
            .query("SELECT * FROM forecast ORDER BY date ASC")
            .await?;
        let points: Vec<ForecastRecord> = res.take(0)?;
        Ok(points)
    }

    pub async fn schedule_assignments(&self) -> Result<Vec<ScheduleAssignmentRecord>, StoreError> {
        let mut res = self.db.query("SELECT * FROM schedule_assignment").await?;
        let assignments: Vec<ScheduleAssignmentRecord> = res.take(0)?;
        Ok(assignments)
    }

    pub async fn triage_decisions(&self) -> Result<Vec<TriageDecisionRecord>, StoreError> {
        let mut res = self.db.query("SELECT * FROM triage_decision").await?;
        let decisions: Vec<TriageDecisionRecord> = res.take(0)?;
        Ok(decisions)
    }

    pub async fn er_queue_entries(&self) -> Result<Vec<ErQueueRecord>, StoreError> {
        let mut res = self
            .db
            .query("SELECT * FROM er_queue ORDER BY arrival_time ASC")
            .await?;
        let entries: Vec<ErQueueRecord> = res.take(0)?;
        Ok(entries)
    }

    /// Number of patients currently waiting, for the status surface.
    pub async fn waiting_count(&self) -> Result<usize, StoreError> {
        let mut res = self
            .db
            .query("SELECT * FROM er_queue WHERE status = 'waiting'")
            .await?;
        let waiting: Vec<ErQueueRecord> = res.take(0)?;
        Ok(waiting.len())
    }

    pub async fn discharge_recommendations(
        &self,
    ) -> Result<Vec<DischargeRecommendationRecord>, StoreError> {
        let mut res = self.db.query("SELECT * FROM discharge_recommendation").await?;
        let recommendations: Vec<DischargeRecommendationRecord> = res.take(0)?;
        Ok(recommendations)
    }

    pub async fn or_assignments(&self) -> Result<Vec<OrScheduleRecord>, StoreError> {
        let mut res = self.db.query("SELECT * FROM or_schedule").await?;
        let assignments: Vec<OrScheduleRecord> = res.take(0)?;
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::VitalSigns;
    use crate::db::connection::{DatabaseConfig, create_connection, ensure_schema};

    async fn memory_store() -> Store {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            namespace: "careflow_test".to_string(),
            database: "queries".to_string(),
            username: None,
            password: None,
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        Store::new(db)
    }

    fn point(date: &str, volume: f64) -> ForecastPoint {
        ForecastPoint {
            date: date.to_string(),
            predicted_volume: volume,
            confidence_lower: volume - 10.0,
            confidence_upper: volume + 10.0,
        }
    }

    #[tokio::test]
    async fn forecast_upsert_updates_on_conflict_and_appends_otherwise() {
        let store = memory_store().await;

        store
            .upsert_forecast_point(&point("2026-03-01", 120.0), "v1.0", "2026-02-28T06:00:00")
            .await
            .unwrap();

        // Same (date, generated_at): the row is rewritten in place.
        store
            .upsert_forecast_point(&point("2026-03-01", 135.0), "v1.0", "2026-02-28T06:00:00")
            .await
            .unwrap();

        let rows = store.forecast_points().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].predicted_volume, 135.0);

        // A later generation for the same date lands in a new row.
        store
            .upsert_forecast_point(&point("2026-03-01", 140.0), "v1.0", "2026-03-01T06:00:00")
            .await
            .unwrap();

        let rows = store.forecast_points().await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn active_staff_excludes_inactive_rows() {
        let store = memory_store().await;

        for (id, active) in [("S-1", true), ("S-2", false), ("S-3", true)] {
            store
                .insert_staff(&StaffCreate {
                    staff_id: id.to_string(),
                    name: format!("Staff {id}"),
                    role: "nurse".to_string(),
                    max_hours_per_week: 40,
                    qualifications: vec!["ICU".to_string()],
                    active,
                })
                .await
                .unwrap();
        }

        let staff = store.active_staff().await.unwrap();
        let mut ids: Vec<_> = staff.iter().map(|s| s.staff_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, ["S-1", "S-3"]);
    }

    #[tokio::test]
    async fn open_inpatients_excludes_discharged_stays() {
        let store = memory_store().await;

        let open = InpatientCreate {
            patient_id: "P-1".to_string(),
            admission_date: "2026-02-20".to_string(),
            diagnosis: "pneumonia".to_string(),
            vitals: VitalSigns::default(),
            procedures_completed: vec![],
            discharge_date: None,
        };
        let closed = InpatientCreate {
            patient_id: "P-2".to_string(),
            discharge_date: Some("2026-02-25".to_string()),
            ..open.clone()
        };

        store.insert_inpatient(&open).await.unwrap();
        store.insert_inpatient(&closed).await.unwrap();

        let inpatients = store.open_inpatients().await.unwrap();
        assert_eq!(inpatients.len(), 1);
        assert_eq!(inpatients[0].patient_id, "P-1");
    }

    #[tokio::test]
    async fn er_queue_entry_is_stamped_waiting_at_insert_time() {
        let store = memory_store().await;

        let before = chrono::Utc::now();
        let entry = store.insert_er_queue_entry("P-7", 2).await.unwrap();
        let after = chrono::Utc::now();

        assert_eq!(entry.status, QueueStatus::Waiting);
        assert!(entry.seen_at.is_none());
        let arrival: chrono::DateTime<chrono::Utc> = entry.arrival_time.0;
        assert!(arrival >= before - chrono::Duration::seconds(1));
        assert!(arrival <= after + chrono::Duration::seconds(1));
    }

    #[tokio::test]
    async fn schedule_rows_accumulate_across_runs() {
        let store = memory_store().await;
        let assignment = ShiftAssignment {
            staff_id: "S-1".to_string(),
            date: "2026-03-02".to_string(),
            shift: "morning".to_string(),
            role: "nurse".to_string(),
        };

        // The same assignment from two separate runs is two rows.
        store.insert_schedule_assignment(&assignment).await.unwrap();
        store.insert_schedule_assignment(&assignment).await.unwrap();

        assert_eq!(store.schedule_assignments().await.unwrap().len(), 2);
    }
}
