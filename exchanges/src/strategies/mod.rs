pub mod direct;
pub mod fanout;
pub mod topic;

use crate::binding::Binding;
use dashmap::DashSet;
use internals::{BrokerError, ExchangeKind, Message};

pub use direct::DirectStrategy;
pub use fanout::FanoutStrategy;
pub use topic::TopicStrategy;

pub trait RoutingStrategy: Send + Sync {
    /// Validates a pattern at bind time. Malformed patterns are rejected
    /// immediately, never silently accepted.
    fn validate_pattern(&self, pattern: &str) -> Result<(), BrokerError>;

    /// Delivers a copy of `msg` to every matching binding and returns the
    /// number of queues reached. Zero matches is not an error: the message
    /// is dropped, fire-and-forget style.
    fn route(&self, msg: &Message, bindings: &DashSet<Binding>) -> Result<u32, BrokerError>;
}

/// Delivery helper shared by the strategies: the copy placed on a queue is
/// already `Delivered`.
fn deliver(msg: &Message, binding: &Binding) -> Result<(), BrokerError> {
    let mut copy = msg.clone();
    copy.mark_delivered();
    binding.queue.enqueue(copy)
}

pub fn strategy_for(kind: ExchangeKind) -> Box<dyn RoutingStrategy> {
    match kind {
        ExchangeKind::Direct => Box::new(DirectStrategy),
        ExchangeKind::Topic => Box::new(TopicStrategy),
        ExchangeKind::Fanout => Box::new(FanoutStrategy),
    }
}
