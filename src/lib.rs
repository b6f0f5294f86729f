// Core modules
pub mod agents;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod supervisor;

// Re-export key types and functions
pub use agents::{AgentHttpClient, AgentService, DecisionServices};
pub use config::OrchestratorConfig;
pub use db::{DatabaseConfig, Store, create_connection, ensure_schema};
pub use error::{AgentError, StoreError};
pub use supervisor::scheduler::JobScheduler;
pub use supervisor::{DailyRunReport, StatusSnapshot, Supervisor};

use std::sync::Arc;

use anyhow::Result;

/// Convenience function to create a fully wired supervisor.
///
/// Connects to the database, applies the schema, builds the HTTP client
/// for the decision services, and returns the supervisor ready for the
/// scheduler or the API to drive. A connection failure here is fatal by
/// design: the process has nothing useful to do without its store.
pub async fn create_supervisor(
    db_config: DatabaseConfig,
    config: &OrchestratorConfig,
) -> Result<Arc<Supervisor>> {
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;

    let agents = Arc::new(AgentHttpClient::new(config.agents.clone())?);
    let supervisor = Supervisor::new(Store::new(db), agents, config);

    Ok(Arc::new(supervisor))
}
