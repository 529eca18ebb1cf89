use super::{deliver, Binding, RoutingStrategy};
use dashmap::DashSet;
use internals::{BrokerError, Message};
use std::collections::HashSet;

/// Fanout routing: every bound queue receives every message, regardless of
/// routing key. A queue bound under several patterns still receives exactly
/// one copy.
pub struct FanoutStrategy;

impl RoutingStrategy for FanoutStrategy {
    fn validate_pattern(&self, _pattern: &str) -> Result<(), BrokerError> {
        // the pattern is ignored for fanout bindings
        Ok(())
    }

    fn route(&self, msg: &Message, bindings: &DashSet<Binding>) -> Result<u32, BrokerError> {
        let mut reached: HashSet<String> = HashSet::new();
        for binding in bindings.iter() {
            if reached.insert(binding.queue.name.clone()) {
                deliver(msg, &binding)?;
            }
        }
        Ok(reached.len() as u32)
    }
}
