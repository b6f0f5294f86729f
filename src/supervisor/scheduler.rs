// Named interval jobs driving the supervisor.
//
// Jobs are plain tokio tasks behind a name registry. The wrapper around
// each body catches and logs failures so a bad tick never unregisters
// the job; only `stop_all` (or process exit) ends a job. Nothing here
// survives a restart - jobs are re-registered fresh on every boot.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::supervisor::Supervisor;

pub const DAILY_WORKFLOW_JOB: &str = "daily_workflow";
pub const HEALTH_CHECK_JOB: &str = "health_check";
pub const DISCHARGE_CHECK_JOB: &str = "discharge_check";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
}

#[derive(Default)]
pub struct JobScheduler {
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named job firing first at `first_fire` and every
    /// `period` after that. Registering an existing name replaces the
    /// previous job, so there is always at most one trigger per name.
    pub async fn register<F, Fut>(&self, name: &str, first_fire: Instant, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let job_name = name.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_fire, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                debug!("job `{job_name}` tick");
                if let Err(e) = job().await {
                    // The job stays registered; the next tick runs as normal.
                    error!("job `{job_name}` failed: {e:#}");
                }
            }
        });

        let mut jobs = self.jobs.lock().await;
        if let Some(previous) = jobs.insert(name.to_string(), handle) {
            warn!("job `{name}` re-registered, stopping previous trigger");
            previous.abort();
        }
    }

    pub async fn job_status(&self, name: &str) -> Option<JobStatus> {
        let jobs = self.jobs.lock().await;
        jobs.contains_key(name).then_some(JobStatus::Running)
    }

    pub async fn job_names(&self) -> Vec<String> {
        let jobs = self.jobs.lock().await;
        let mut names: Vec<String> = jobs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Halt every registered job and clear the registry.
    pub async fn stop_all(&self) {
        let mut jobs = self.jobs.lock().await;
        for (name, handle) in jobs.drain() {
            info!("stopping job `{name}`");
            handle.abort();
        }
    }

    /// Register the fixed timetable: the daily pipeline at the configured
    /// hour, health probing, and the discharge-planning check. With the
    /// scheduler disabled, no jobs are registered at all.
    pub async fn start(&self, config: &SchedulerConfig, supervisor: Arc<Supervisor>) {
        if !config.enabled {
            info!("scheduler disabled, no jobs registered");
            return;
        }

        let day = Duration::from_secs(24 * 3600);
        let first_daily = Instant::now() + duration_until_hour(Utc::now(), config.daily_hour);
        let daily_supervisor = supervisor.clone();
        self.register(DAILY_WORKFLOW_JOB, first_daily, day, move || {
            let supervisor = daily_supervisor.clone();
            async move {
                supervisor.run_daily_workflow().await;
                Ok(())
            }
        })
        .await;

        let health_period = Duration::from_secs(config.health_interval_secs);
        let health_supervisor = supervisor.clone();
        self.register(
            HEALTH_CHECK_JOB,
            Instant::now() + health_period,
            health_period,
            move || {
                let supervisor = health_supervisor.clone();
                async move {
                    let health = supervisor.check_agent_health().await;
                    for service in unhealthy_services(&health) {
                        warn!("decision service `{service}` is unhealthy");
                    }
                    Ok(())
                }
            },
        )
        .await;

        let discharge_period = Duration::from_secs(config.discharge_interval_secs);
        self.register(
            DISCHARGE_CHECK_JOB,
            Instant::now() + discharge_period,
            discharge_period,
            move || {
                let supervisor = supervisor.clone();
                async move {
                    supervisor.run_discharge_planning().await;
                    Ok(())
                }
            },
        )
        .await;

        info!(
            "scheduler started: daily at {:02}:00 UTC, health every {}s, discharge every {}s",
            config.daily_hour, config.health_interval_secs, config.discharge_interval_secs
        );
    }
}

/// Time left until the next occurrence of `hour:00` UTC.
fn duration_until_hour(now: DateTime<Utc>, hour: u32) -> Duration {
    let today = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("hour out of range")
        .and_utc();

    let fire = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };

    (fire - now).to_std().unwrap_or_default()
}

/// Names of the services a health map reports as down.
fn unhealthy_services<'a>(health: &'a std::collections::BTreeMap<&'static str, bool>) -> Vec<&'a str> {
    health
        .iter()
        .filter_map(|(service, healthy)| (!healthy).then_some(*service))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn register_status_and_stop_all() {
        let scheduler = JobScheduler::new();
        scheduler
            .register(
                "noop",
                Instant::now() + Duration::from_secs(3600),
                Duration::from_secs(3600),
                || async { Ok(()) },
            )
            .await;

        assert_eq!(scheduler.job_status("noop").await, Some(JobStatus::Running));
        assert_eq!(scheduler.job_status("missing").await, None);
        assert_eq!(scheduler.job_names().await, vec!["noop".to_string()]);

        scheduler.stop_all().await;
        assert_eq!(scheduler.job_status("noop").await, None);
        assert!(scheduler.job_names().await.is_empty());
    }

    #[tokio::test]
    async fn failing_job_keeps_ticking() {
        let scheduler = JobScheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let job_ticks = ticks.clone();
        scheduler
            .register(
                "flaky",
                Instant::now(),
                Duration::from_millis(10),
                move || {
                    let ticks = job_ticks.clone();
                    async move {
                        ticks.fetch_add(1, Ordering::Relaxed);
                        anyhow::bail!("tick failed")
                    }
                },
            )
            .await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop_all().await;

        // Every failure was swallowed at the job boundary and the ticks
        // kept coming.
        assert!(ticks.load(Ordering::Relaxed) >= 3);
    }

    #[tokio::test]
    async fn re_registering_replaces_the_previous_trigger() {
        let scheduler = JobScheduler::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        scheduler
            .register("job", Instant::now(), Duration::from_millis(10), move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
            })
            .await;

        tokio::time::sleep(Duration::from_millis(30)).await;

        let counter = second.clone();
        scheduler
            .register("job", Instant::now(), Duration::from_millis(10), move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
            })
            .await;

        // Let any in-flight tick of the replaced job drain before sampling.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let first_after_replace = first.load(Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop_all().await;

        assert_eq!(scheduler.job_names().await.len(), 0);
        assert_eq!(first.load(Ordering::Relaxed), first_after_replace);
        assert!(second.load(Ordering::Relaxed) >= 2);
    }

    #[test]
    fn duration_until_hour_rolls_to_tomorrow() {
        let now = "2026-03-01T10:30:00Z".parse::<DateTime<Utc>>().unwrap();

        // Later today.
        let until = duration_until_hour(now, 11);
        assert_eq!(until, Duration::from_secs(30 * 60));

        // Already past: tomorrow.
        let until = duration_until_hour(now, 6);
        assert_eq!(until, Duration::from_secs((24 - 10) * 3600 - 30 * 60 + 6 * 3600));
    }

    #[test]
    fn unhealthy_services_lists_only_down_services() {
        let health = std::collections::BTreeMap::from([
            ("triage", false),
            ("demand_forecast", true),
            ("staff_scheduling", false),
        ]);
        assert_eq!(unhealthy_services(&health), vec!["staff_scheduling", "triage"]);
    }
}
