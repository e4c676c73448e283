use crate::core::iam::Action;
use crate::core::model::GraphName;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Access denied: {action} on graph {graph}")]
    AccessDenied { action: Action, graph: String },

    #[error("Policy query failed: {0}")]
    PolicyQuery(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid IRI: {0} (must be an absolute IRI such as https://example.org/graphs/)")]
    InvalidIri(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GuardError {
    pub fn access_denied(action: Action, graph: &GraphName) -> Self {
        GuardError::AccessDenied {
            action,
            graph: graph.to_string(),
        }
    }

    /// Wrap an infrastructure failure raised while answering a policy question
    pub fn policy_query(err: impl std::fmt::Display) -> Self {
        GuardError::PolicyQuery(err.to_string())
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, GuardError::AccessDenied { .. })
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
