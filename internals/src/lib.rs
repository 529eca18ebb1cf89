mod config;
mod errors;
mod structs;

pub use config::{BrokerConfig, ExchangeKind, PersistenceMode};
pub use errors::BrokerError;
pub use structs::{Message, MessageStatus};
