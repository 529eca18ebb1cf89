use thiserror::Error;

/// Structural broker errors. These are returned synchronously to the caller
/// and never leave partial state behind. Simulated consumer errors are not
/// part of this taxonomy - they are counters, not faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Invalid binding pattern '{0}'")]
    InvalidBindingPattern(String),

    #[error("Queue not found: '{0}'")]
    QueueNotFound(String),

    #[error("Queue already exists: '{0}'")]
    QueueAlreadyExists(String),

    #[error("Queue '{queue}' is still referenced by {bindings} binding(s)")]
    QueueInUse { queue: String, bindings: usize },

    #[error("Invalid consumer configuration: {0}")]
    InvalidConsumerConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
