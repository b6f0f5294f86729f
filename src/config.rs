use serde::Deserialize;
use std::{env, fs, path::PathBuf};

/// Top-level orchestrator configuration, loaded from a JSON file.
///
/// Every section carries serde defaults so a missing file (or a partial
/// one) still yields a runnable configuration pointing at the conventional
/// local agent ports.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub agents: AgentEndpoints,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub triage: TriagePolicy,
}

/// Base URLs for the five decision services.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentEndpoints {
    #[serde(default = "default_forecast_url")]
    pub demand_forecast: String,
    #[serde(default = "default_staff_url")]
    pub staff_scheduling: String,
    #[serde(default = "default_triage_url")]
    pub triage: String,
    #[serde(default = "default_discharge_url")]
    pub discharge_planning: String,
    #[serde(default = "default_eror_url")]
    pub er_or_scheduling: String,
    /// Per-request timeout applied to every decision-service call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_forecast_url() -> String {
    "http://localhost:8001".to_string()
}
fn default_staff_url() -> String {
    "http://localhost:8002".to_string()
}
fn default_eror_url() -> String {
    "http://localhost:8003".to_string()
}
fn default_discharge_url() -> String {
    "http://localhost:8004".to_string()
}
fn default_triage_url() -> String {
    "http://localhost:8005".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for AgentEndpoints {
    fn default() -> Self {
        Self {
            demand_forecast: default_forecast_url(),
            staff_scheduling: default_staff_url(),
            triage: default_triage_url(),
            discharge_planning: default_discharge_url(),
            er_or_scheduling: default_eror_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Timetable for the scheduled jobs. `enabled = false` registers no jobs
/// at all; the workflows stay invocable through the API and CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Hour of day (0-23, UTC) at which the daily workflow fires.
    #[serde(default = "default_daily_hour")]
    pub daily_hour: u32,
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,
    #[serde(default = "default_discharge_interval")]
    pub discharge_interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_daily_hour() -> u32 {
    6
}
fn default_health_interval() -> u64 {
    300
}
fn default_discharge_interval() -> u64 {
    6 * 3600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_hour: default_daily_hour(),
            health_interval_secs: default_health_interval(),
            discharge_interval_secs: default_discharge_interval(),
        }
    }
}

/// Fixed inputs to the daily pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_horizon")]
    pub forecast_horizon_days: u32,
    #[serde(default = "default_morning")]
    pub min_staff_morning: u32,
    #[serde(default = "default_afternoon")]
    pub min_staff_afternoon: u32,
    #[serde(default = "default_night")]
    pub min_staff_night: u32,
    #[serde(default = "default_shift_hours")]
    pub shift_duration_hours: u32,
}

fn default_horizon() -> u32 {
    7
}
fn default_morning() -> u32 {
    5
}
fn default_afternoon() -> u32 {
    6
}
fn default_night() -> u32 {
    4
}
fn default_shift_hours() -> u32 {
    8
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            forecast_horizon_days: default_horizon(),
            min_staff_morning: default_morning(),
            min_staff_afternoon: default_afternoon(),
            min_staff_night: default_night(),
            shift_duration_hours: default_shift_hours(),
        }
    }
}

/// Acuity-to-queue policy.
///
/// The triage service grades acuity on the ESI-style 1-5 scale where 1 is
/// Resuscitation and 5 is Non-Urgent: lower numbers are more severe. A
/// patient enters the ER queue when their acuity is at or below
/// `er_queue_max_acuity`. Every call site must route through
/// [`TriagePolicy::requires_er_queue`] so the threshold cannot drift.
#[derive(Debug, Clone, Deserialize)]
pub struct TriagePolicy {
    #[serde(default = "default_max_acuity")]
    pub er_queue_max_acuity: u8,
}

fn default_max_acuity() -> u8 {
    3
}

impl Default for TriagePolicy {
    fn default() -> Self {
        Self {
            er_queue_max_acuity: default_max_acuity(),
        }
    }
}

impl TriagePolicy {
    pub fn requires_er_queue(&self, acuity_level: u8) -> bool {
        acuity_level <= self.er_queue_max_acuity
    }
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("ORCHESTRATOR_CONFIG") {
        return Some(PathBuf::from(p));
    }

    let candidate = PathBuf::from("orchestrator.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            while let Some(c) = chars.next() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

impl OrchestratorConfig {
    /// Load configuration from the resolved path, falling back to defaults
    /// when no file exists. Endpoint URLs support `${VAR}` expansion so
    /// deployments can keep hostnames in the environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match resolve_config_path() {
            Some(path) => {
                let raw = fs::read_to_string(&path)?;
                serde_json::from_str::<OrchestratorConfig>(&raw)?
            }
            None => OrchestratorConfig::default(),
        };

        let agents = &mut config.agents;
        agents.demand_forecast = expand_env_vars(&agents.demand_forecast);
        agents.staff_scheduling = expand_env_vars(&agents.staff_scheduling);
        agents.triage = expand_env_vars(&agents.triage);
        agents.discharge_planning = expand_env_vars(&agents.discharge_planning);
        agents.er_or_scheduling = expand_env_vars(&agents.er_or_scheduling);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config: OrchestratorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.workflow.forecast_horizon_days, 7);
        assert_eq!(config.workflow.min_staff_afternoon, 6);
        assert_eq!(config.scheduler.health_interval_secs, 300);
        assert_eq!(config.scheduler.discharge_interval_secs, 21600);
        assert!(config.scheduler.enabled);
        assert_eq!(config.triage.er_queue_max_acuity, 3);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: OrchestratorConfig = serde_json::from_str(
            r#"{"scheduler": {"enabled": false}, "triage": {"er_queue_max_acuity": 2}}"#,
        )
        .unwrap();
        assert!(!config.scheduler.enabled);
        assert_eq!(config.triage.er_queue_max_acuity, 2);
        assert_eq!(config.scheduler.daily_hour, 6);
    }

    #[test]
    fn queue_policy_treats_lower_acuity_as_more_severe() {
        let policy = TriagePolicy::default();
        assert!(policy.requires_er_queue(1)); // Resuscitation
        assert!(policy.requires_er_queue(3)); // Urgent
        assert!(!policy.requires_er_queue(4)); // Less Urgent
        assert!(!policy.requires_er_queue(5)); // Non-Urgent
    }

    #[test]
    fn expands_env_vars_in_endpoints() {
        unsafe { env::set_var("CAREFLOW_TEST_TRIAGE_HOST", "triage.internal") };
        let expanded = expand_env_vars("http://${CAREFLOW_TEST_TRIAGE_HOST}:8005");
        assert_eq!(expanded, "http://triage.internal:8005");

        // Unknown variables are left intact rather than erased.
        let untouched = expand_env_vars("http://${CAREFLOW_TEST_UNSET}/x");
        assert_eq!(untouched, "http://${CAREFLOW_TEST_UNSET}/x");
    }
}
