//! Failure taxonomy for the orchestration core.
//!
//! The supervisor decides at each call site whether a failure is tolerated
//! (stage yields nothing, pipeline continues) or fatal (propagated to the
//! caller). These types exist so that classification happens on structured
//! variants rather than string matching.

use thiserror::Error;

/// A single decision-service round trip failed. There is no retry layer:
/// one of these means the call is over and the supervisor must decide
/// what that means for the workflow.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("agent `{service}` unreachable: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("agent `{service}` timed out")]
    Timeout { service: &'static str },

    #[error("agent `{service}` returned HTTP {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("agent `{service}` returned an undecodable body: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl AgentError {
    /// Fold a reqwest error into the taxonomy, splitting timeouts out so
    /// they are distinguishable from plain connectivity failures.
    pub fn transport(service: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            AgentError::Timeout { service }
        } else {
            AgentError::Transport { service, source }
        }
    }

    /// Name of the service the failed call was addressed to.
    pub fn service(&self) -> &'static str {
        match self {
            AgentError::Transport { service, .. }
            | AgentError::Timeout { service }
            | AgentError::Status { service, .. }
            | AgentError::Decode { service, .. } => service,
        }
    }
}

/// A persistence-gateway operation failed. Writes are best-effort side
/// channels for every workflow, so the supervisor logs and counts these
/// rather than propagating them; reads surface normally.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("store returned no record for {operation}")]
    MissingRecord { operation: &'static str },
}
