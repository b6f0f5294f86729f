use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "careflow".to_string()),
            database: env::var("SURREALDB_DATABASE")
                .unwrap_or_else(|_| "orchestrator".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        // Staff roster. Rows are owned by the HR-facing collaborator; the
        // orchestrator only reads the active subset.
        "DEFINE TABLE IF NOT EXISTS staff SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS staff_id ON TABLE staff TYPE string;
         DEFINE FIELD IF NOT EXISTS name ON TABLE staff TYPE string;
         DEFINE FIELD IF NOT EXISTS role ON TABLE staff TYPE string;
         DEFINE FIELD IF NOT EXISTS max_hours_per_week ON TABLE staff TYPE number;
         DEFINE FIELD IF NOT EXISTS qualifications ON TABLE staff TYPE array<string>;
         DEFINE FIELD IF NOT EXISTS active ON TABLE staff TYPE bool DEFAULT true;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE staff VALUE time::now();",

        // Admitted patients; an absent discharge_date marks an open stay.
        "DEFINE TABLE IF NOT EXISTS inpatient SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS patient_id ON TABLE inpatient TYPE string;
         DEFINE FIELD IF NOT EXISTS admission_date ON TABLE inpatient TYPE string;
         DEFINE FIELD IF NOT EXISTS diagnosis ON TABLE inpatient TYPE string;
         DEFINE FIELD IF NOT EXISTS discharge_date ON TABLE inpatient TYPE option<string>;",

        // One row per forecast point, unique per (date, generated_at).
        "DEFINE TABLE IF NOT EXISTS forecast SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS date ON TABLE forecast TYPE string;
         DEFINE FIELD IF NOT EXISTS predicted_volume ON TABLE forecast TYPE float;
         DEFINE FIELD IF NOT EXISTS confidence_lower ON TABLE forecast TYPE float;
         DEFINE FIELD IF NOT EXISTS confidence_upper ON TABLE forecast TYPE float;
         DEFINE FIELD IF NOT EXISTS model_version ON TABLE forecast TYPE string;
         DEFINE FIELD IF NOT EXISTS generated_at ON TABLE forecast TYPE string;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE forecast VALUE time::now();",

        // Shift assignments accumulate run over run; the history is the
        // audit trail, so no uniqueness is enforced.
        "DEFINE TABLE IF NOT EXISTS schedule_assignment SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS staff_id ON TABLE schedule_assignment TYPE string;
         DEFINE FIELD IF NOT EXISTS date ON TABLE schedule_assignment TYPE string;
         DEFINE FIELD IF NOT EXISTS shift ON TABLE schedule_assignment TYPE string;
         DEFINE FIELD IF NOT EXISTS role ON TABLE schedule_assignment TYPE string;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE schedule_assignment VALUE time::now();",

        "DEFINE TABLE IF NOT EXISTS triage_decision SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS patient_id ON TABLE triage_decision TYPE string;
         DEFINE FIELD IF NOT EXISTS acuity_level ON TABLE triage_decision TYPE number;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE triage_decision VALUE time::now();",

        "DEFINE TABLE IF NOT EXISTS er_queue SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS patient_id ON TABLE er_queue TYPE string;
         DEFINE FIELD IF NOT EXISTS acuity_level ON TABLE er_queue TYPE number;
         DEFINE FIELD IF NOT EXISTS arrival_time ON TABLE er_queue TYPE datetime;
         DEFINE FIELD IF NOT EXISTS status ON TABLE er_queue TYPE string;
         DEFINE FIELD IF NOT EXISTS seen_at ON TABLE er_queue TYPE option<datetime>;",

        "DEFINE TABLE IF NOT EXISTS discharge_recommendation SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS patient_id ON TABLE discharge_recommendation TYPE string;
         DEFINE FIELD IF NOT EXISTS discharge_readiness_score ON TABLE discharge_recommendation TYPE float;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE discharge_recommendation VALUE time::now();",

        "DEFINE TABLE IF NOT EXISTS or_schedule SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS case_id ON TABLE or_schedule TYPE string;
         DEFINE FIELD IF NOT EXISTS or_room ON TABLE or_schedule TYPE number;
         DEFINE FIELD IF NOT EXISTS start_time ON TABLE or_schedule TYPE string;
         DEFINE FIELD IF NOT EXISTS estimated_duration ON TABLE or_schedule TYPE number;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE or_schedule VALUE time::now();",

        // Indexes
        "DEFINE INDEX IF NOT EXISTS staff_staff_id ON TABLE staff COLUMNS staff_id UNIQUE;
         DEFINE INDEX IF NOT EXISTS forecast_date_generated ON TABLE forecast COLUMNS date, generated_at UNIQUE;
         DEFINE INDEX IF NOT EXISTS er_queue_status ON TABLE er_queue COLUMNS status;
         DEFINE INDEX IF NOT EXISTS inpatient_patient_id ON TABLE inpatient COLUMNS patient_id;",
    ];

    for query in schema_queries {
        db.query(query).await?;
    }

    Ok(())
}
