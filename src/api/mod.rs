// HTTP surface for the orchestrator: event ingress plus introspection.
//
// This is deliberately not a CRUD layer. Arrivals and OR case batches
// come in here, and operators can read the supervisor's status; record
// management belongs to the surrounding platform.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agents::{SurgicalCase, TriageRequest};
use crate::supervisor::Supervisor;
use crate::supervisor::scheduler::JobScheduler;

#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub scheduler: Arc<JobScheduler>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/agents/health", get(agent_health))
        .route("/arrivals", post(handle_arrival))
        .route("/or-schedule", post(schedule_or_cases))
        .route("/workflows/daily", post(run_daily_workflow))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

async fn status(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let snapshot = state.supervisor.status().await;
    let jobs = state.scheduler.job_names().await;

    // The waiting count comes from the store rather than the snapshot:
    // queue entries are written by arrivals, not by the daily pipeline.
    let er_waiting = state
        .supervisor
        .store()
        .waiting_count()
        .await
        .map_err(|_e| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({
        "workflow": snapshot,
        "er_waiting": er_waiting,
        "jobs": jobs,
    })))
}

async fn agent_health(State(state): State<AppState>) -> Json<Value> {
    let health = state.supervisor.check_agent_health().await;
    Json(serde_json::json!(health))
}

async fn handle_arrival(
    State(state): State<AppState>,
    Json(request): Json<TriageRequest>,
) -> Result<Json<Value>, StatusCode> {
    // Triage failure is fatal for this call; surface it as a gateway error.
    let decision = state
        .supervisor
        .handle_arrival(&request)
        .await
        .map_err(|_e| StatusCode::BAD_GATEWAY)?;

    Ok(Json(serde_json::json!(decision)))
}

async fn schedule_or_cases(
    State(state): State<AppState>,
    Json(cases): Json<Vec<SurgicalCase>>,
) -> Result<Json<Value>, StatusCode> {
    let assignments = state
        .supervisor
        .schedule_or_cases(&cases)
        .await
        .map_err(|_e| StatusCode::BAD_GATEWAY)?;

    let count = assignments.len();
    Ok(Json(serde_json::json!({
        "schedule": assignments,
        "count": count
    })))
}

async fn run_daily_workflow(State(state): State<AppState>) -> Json<Value> {
    let report = state.supervisor.run_daily_workflow().await;
    Json(serde_json::json!(report))
}
