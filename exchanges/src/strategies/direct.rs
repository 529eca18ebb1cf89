use super::{deliver, Binding, RoutingStrategy};
use dashmap::DashSet;
use internals::{BrokerError, Message};

/// Direct routing: the binding pattern must equal the routing key exactly.
pub struct DirectStrategy;

impl RoutingStrategy for DirectStrategy {
    fn validate_pattern(&self, pattern: &str) -> Result<(), BrokerError> {
        if pattern.is_empty() {
            return Err(BrokerError::InvalidBindingPattern(pattern.to_string()));
        }
        Ok(())
    }

    fn route(&self, msg: &Message, bindings: &DashSet<Binding>) -> Result<u32, BrokerError> {
        let key = match msg.routing_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => key,
            // no key can match any valid pattern, so this delivers nowhere
            None => return Ok(0),
        };

        let mut delivered = 0;
        for binding in bindings.iter() {
            if binding.pattern == key {
                deliver(msg, &binding)?;
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queues::Queue;
    use std::sync::Arc;

    #[test]
    fn delivers_only_on_exact_key_match() {
        let strategy = DirectStrategy;
        let bindings = DashSet::new();

        let target_q = Arc::new(Queue::new("target_q"));
        let other_q = Arc::new(Queue::new("other_q"));
        bindings.insert(Binding::new("a", Arc::clone(&target_q)));
        bindings.insert(Binding::new("b", Arc::clone(&other_q)));

        for _ in 0..5 {
            let msg = Message::new("payload", Some("a".into()));
            assert_eq!(strategy.route(&msg, &bindings).unwrap(), 1);
        }

        assert_eq!(target_q.depth(), 5);
        assert_eq!(other_q.depth(), 0);
    }

    #[test]
    fn no_match_reports_zero_deliveries() {
        let strategy = DirectStrategy;
        let bindings = DashSet::new();
        bindings.insert(Binding::new("a", Arc::new(Queue::new("q"))));

        let msg = Message::new("payload", Some("unbound".into()));
        assert_eq!(strategy.route(&msg, &bindings).unwrap(), 0);
    }

    #[test]
    fn missing_routing_key_delivers_nowhere() {
        let strategy = DirectStrategy;
        let bindings = DashSet::new();
        bindings.insert(Binding::new("a", Arc::new(Queue::new("q"))));

        let msg = Message::new("payload", None);
        assert_eq!(strategy.route(&msg, &bindings).unwrap(), 0);
    }

    #[test]
    fn rejects_empty_pattern() {
        assert!(matches!(
            DirectStrategy.validate_pattern(""),
            Err(BrokerError::InvalidBindingPattern(_))
        ));
        assert!(DirectStrategy.validate_pattern("orders").is_ok());
    }
}
