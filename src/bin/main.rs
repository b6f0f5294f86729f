use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use careflow_orchestrator::agents::VitalSigns;
use careflow_orchestrator::db::{InpatientCreate, StaffCreate};
use careflow_orchestrator::{
    DatabaseConfig, JobScheduler, OrchestratorConfig, Store, create_connection, create_supervisor,
    ensure_schema,
};

#[derive(Parser)]
#[command(name = "careflow-orchestrator")]
#[command(about = "Hospital operations orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the orchestrator: scheduled workflows plus the HTTP surface
    Server {
        #[arg(short, long, default_value = "8080")]
        port: u16,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Run the daily pipeline once and print the run report
    RunDaily {
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Probe every decision service and print its health
    CheckHealth {
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Initialize the database schema
    Init {
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
        /// Also seed a small demo roster and census
        #[arg(long, default_value_t = false)]
        demo: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("careflow_orchestrator=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let config = OrchestratorConfig::load()?;

    match cli.command {
        Commands::Server { port, db_url } => {
            info!("starting orchestrator on port {}", port);

            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };

            // Boot is fatal if the store is unreachable; the `?` here is
            // the process exit path.
            let supervisor = create_supervisor(db_config, &config).await?;

            let scheduler = Arc::new(JobScheduler::new());
            scheduler.start(&config.scheduler, supervisor.clone()).await;

            let app = careflow_orchestrator::api::create_router(careflow_orchestrator::api::AppState {
                supervisor,
                scheduler: scheduler.clone(),
            });

            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
            info!("listening on http://0.0.0.0:{port}");

            axum::serve(listener, app).await?;
            scheduler.stop_all().await;
        }
        Commands::RunDaily { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let supervisor = create_supervisor(db_config, &config).await?;

            let report = supervisor.run_daily_workflow().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::CheckHealth { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let supervisor = create_supervisor(db_config, &config).await?;

            let health = supervisor.check_agent_health().await;
            for (service, healthy) in &health {
                let status = if *healthy { "healthy" } else { "unhealthy" };
                println!("{service:<20} {status}");
            }
        }
        Commands::Init { db_url, demo } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };

            info!("initializing database...");
            let db = create_connection(db_config).await?;
            ensure_schema(&db).await?;

            if demo {
                seed_demo_data(&Store::new(db)).await?;
                info!("seeded demo roster and census");
            }

            info!("database initialized successfully");
        }
    }

    Ok(())
}

/// Seed a handful of staff and open inpatient stays so the daily pipeline
/// has something to schedule against out of the box.
async fn seed_demo_data(store: &Store) -> Result<()> {
    let roster = [
        ("S-001", "Asha Rao", "nurse", vec!["ER", "ICU"]),
        ("S-002", "Miguel Ortiz", "nurse", vec!["ER"]),
        ("S-003", "Priya Nair", "physician", vec!["internal medicine"]),
        ("S-004", "Jonas Weber", "technician", vec!["radiology"]),
    ];

    for (staff_id, name, role, qualifications) in roster {
        store
            .insert_staff(&StaffCreate {
                staff_id: staff_id.to_string(),
                name: name.to_string(),
                role: role.to_string(),
                max_hours_per_week: 40,
                qualifications: qualifications.into_iter().map(String::from).collect(),
                active: true,
            })
            .await?;
    }

    let census = [
        ("P-1001", "2026-02-20", "community-acquired pneumonia"),
        ("P-1002", "2026-02-24", "post-operative observation"),
    ];

    for (patient_id, admission_date, diagnosis) in census {
        store
            .insert_inpatient(&InpatientCreate {
                patient_id: patient_id.to_string(),
                admission_date: admission_date.to_string(),
                diagnosis: diagnosis.to_string(),
                vitals: VitalSigns::default(),
                procedures_completed: vec![],
                discharge_date: None,
            })
            .await?;
    }

    Ok(())
}
