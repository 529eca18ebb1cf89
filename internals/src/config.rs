use serde::{Deserialize, Serialize};

/// Routing semantics of the broker's exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    #[default]
    Direct,
    Topic,
    Fanout,
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeKind::Direct => write!(f, "direct"),
            ExchangeKind::Topic => write!(f, "topic"),
            ExchangeKind::Fanout => write!(f, "fanout"),
        }
    }
}

/// `Disk` is accepted to preserve the configuration contract but the broker
/// keeps everything in memory; persistence belongs to an external collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    #[default]
    Memory,
    Disk,
}

/// Broker configuration, passed explicitly to constructors. The broker never
/// reads ambient global state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub exchange_type: ExchangeKind,
    #[serde(default)]
    pub persistence: PersistenceMode,
    /// Informational only; retention is enforced by an external archival collaborator.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
    /// Informational only; payload bytes are never transformed.
    #[serde(default)]
    pub compression: bool,
}

fn default_retention_hours() -> u32 {
    24
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            exchange_type: ExchangeKind::default(),
            persistence: PersistenceMode::default(),
            retention_hours: default_retention_hours(),
            compression: false,
        }
    }
}
