use thiserror::Error;

/// Errors raised while parsing or validating an Xray engine configuration.
///
/// These map to 400-class failures at the admin surface: an invalid config is
/// rejected at create/modify time and never served.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("Inbound '{tag}': {reason}")]
    Inbound { tag: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn inbound(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Inbound {
            tag: tag.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while rendering a subscription.
///
/// Per-host problems are never surfaced here; an unresolvable host is
/// skipped with a log event. Only malformed top-level arguments and
/// serializer failures abort a render.
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Unknown subscription format: {0}")]
    UnknownFormat(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised by the node supervisor when talking to a node.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Node is not connected")]
    NotConnected,

    #[error("Node API responded but the core is not started")]
    NotStarted,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC timed out after {0:?}")]
    Timeout(std::time::Duration),
}
