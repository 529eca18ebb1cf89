//! In-process message-broker simulator: a single exchange routing into FIFO
//! queues, drained by a timer-driven consumer loop, observed by a read-only
//! metrics aggregator.

mod broker;
mod consumer;
mod history;
pub mod metrics;

pub use broker::{Broker, PublishReceipt};
pub use consumer::{
    ConsumerHandle, ConsumerStats, ConsumerStatus, DEFAULT_PROCESSING_DELAY, MAX_PROCESSING_DELAY,
    MIN_PROCESSING_DELAY,
};
pub use history::{EventKind, HistoryEvent, MessageHistory, MAX_MESSAGE_HISTORY};
