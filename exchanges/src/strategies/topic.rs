use super::{deliver, Binding, RoutingStrategy};
use dashmap::DashSet;
use internals::{BrokerError, Message};

/// Topic routing with wildcard patterns.
///
/// Routing keys and patterns are dot-separated segments. `*` matches exactly
/// one segment; `#` matches zero or more trailing segments and is only valid
/// as the final pattern segment.
///
/// Examples:
/// - `orders.*` matches `orders.created` but not `orders` or `orders.created.eu`
/// - `orders.#` matches `orders`, `orders.created`, and `orders.created.eu`
pub struct TopicStrategy;

impl TopicStrategy {
    fn matches(pattern: &str, routing_key: &str) -> bool {
        let mut key_segments = routing_key.split('.');
        for segment in pattern.split('.') {
            // a validated pattern only carries '#' in final position, where
            // it consumes the remainder of the key, zero or more segments
            if segment == "#" {
                return true;
            }
            match key_segments.next() {
                Some(key_segment) if segment == "*" || segment == key_segment => {}
                _ => return false,
            }
        }
        key_segments.next().is_none()
    }
}

impl RoutingStrategy for TopicStrategy {
    fn validate_pattern(&self, pattern: &str) -> Result<(), BrokerError> {
        if pattern.is_empty() {
            return Err(BrokerError::InvalidBindingPattern(pattern.to_string()));
        }
        let segments: Vec<&str> = pattern.split('.').collect();
        for (idx, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(BrokerError::InvalidBindingPattern(pattern.to_string()));
            }
            if *segment == "#" && idx != segments.len() - 1 {
                return Err(BrokerError::InvalidBindingPattern(pattern.to_string()));
            }
        }
        Ok(())
    }

    fn route(&self, msg: &Message, bindings: &DashSet<Binding>) -> Result<u32, BrokerError> {
        let key = match msg.routing_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => return Ok(0),
        };

        let mut delivered = 0;
        for binding in bindings.iter() {
            if Self::matches(&binding.pattern, key) {
                deliver(msg, &binding)?;
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}
