use crate::binding::Binding;
use crate::strategies::{strategy_for, RoutingStrategy};
use dashmap::DashSet;
use internals::{BrokerError, ExchangeKind, Message};
use queues::Queue;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Routing component deciding which queues receive a published message.
///
/// The strategy is swappable at runtime: changing the exchange kind leaves
/// the binding table and already populated queues untouched.
pub struct Exchange {
    pub name: String,
    kind: RwLock<ExchangeKind>,
    strategy: RwLock<Box<dyn RoutingStrategy>>,
    bindings: DashSet<Binding>,
}

impl Exchange {
    pub fn new(name: impl Into<String>, kind: ExchangeKind) -> Self {
        Self {
            name: name.into(),
            kind: RwLock::new(kind),
            strategy: RwLock::new(strategy_for(kind)),
            bindings: DashSet::new(),
        }
    }

    pub fn kind(&self) -> ExchangeKind {
        self.kind.read().map(|k| *k).unwrap_or_default()
    }

    pub fn set_kind(&self, kind: ExchangeKind) -> Result<(), BrokerError> {
        let mut strategy = self
            .strategy
            .write()
            .map_err(|_| BrokerError::Internal("exchange lock poisoned".to_string()))?;
        let mut current = self
            .kind
            .write()
            .map_err(|_| BrokerError::Internal("exchange lock poisoned".to_string()))?;
        info!(exchange_name = %self.name, from = %current, to = %kind, "changing exchange kind");
        *strategy = strategy_for(kind);
        *current = kind;
        Ok(())
    }

    /// Binds a queue under a pattern. The pattern is validated against the
    /// current exchange kind before anything is mutated.
    pub fn bind(&self, queue: Arc<Queue>, pattern: &str) -> Result<(), BrokerError> {
        let strategy = self
            .strategy
            .read()
            .map_err(|_| BrokerError::Internal("exchange lock poisoned".to_string()))?;
        strategy.validate_pattern(pattern)?;
        self.bindings.insert(Binding::new(pattern, queue));
        Ok(())
    }

    /// Removes a single (pattern, queue) binding; returns whether it existed.
    pub fn unbind(&self, queue_name: &str, pattern: &str) -> bool {
        let before = self.bindings.len();
        self.bindings
            .retain(|b| !(b.queue.name == queue_name && b.pattern == pattern));
        self.bindings.len() < before
    }

    /// Number of bindings still referencing the given queue. Used as the
    /// deletion guard: a queue cannot be removed while this is non-zero.
    pub fn bindings_for(&self, queue_name: &str) -> usize {
        self.bindings
            .iter()
            .filter(|b| b.queue.name == queue_name)
            .count()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Routes a message per the current strategy, returning how many queues
    /// it reached. Zero is a valid, non-error outcome.
    pub fn route(&self, msg: &Message) -> Result<u32, BrokerError> {
        let strategy = self
            .strategy
            .read()
            .map_err(|_| BrokerError::Internal("exchange lock poisoned".to_string()))?;
        strategy.route(msg, &self.bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_management() {
        let ex = Exchange::new("test_ex", ExchangeKind::Direct);
        let q = Arc::new(Queue::new("q"));

        ex.bind(Arc::clone(&q), "a").unwrap();
        ex.bind(Arc::clone(&q), "b").unwrap();
        assert_eq!(ex.binding_count(), 2);
        assert_eq!(ex.bindings_for("q"), 2);

        assert!(ex.unbind("q", "a"));
        assert!(!ex.unbind("q", "a"));
        assert_eq!(ex.bindings_for("q"), 1);
    }

    #[test]
    fn duplicate_bindings_collapse() {
        let ex = Exchange::new("dup_ex", ExchangeKind::Direct);
        let q = Arc::new(Queue::new("q"));

        ex.bind(Arc::clone(&q), "a").unwrap();
        ex.bind(Arc::clone(&q), "a").unwrap();
        assert_eq!(ex.binding_count(), 1);
    }

    #[test]
    fn bind_validates_against_current_kind() {
        let ex = Exchange::new("topic_ex", ExchangeKind::Topic);
        let q = Arc::new(Queue::new("q"));

        assert!(matches!(
            ex.bind(Arc::clone(&q), "#.orders"),
            Err(BrokerError::InvalidBindingPattern(_))
        ));
        assert_eq!(ex.binding_count(), 0);

        ex.bind(q, "orders.#").unwrap();
        assert_eq!(ex.binding_count(), 1);
    }

    #[test]
    fn kind_change_keeps_bindings_and_queue_contents() {
        let ex = Exchange::new("reconf_ex", ExchangeKind::Direct);
        let q = Arc::new(Queue::new("q"));
        ex.bind(Arc::clone(&q), "orders").unwrap();

        let msg = Message::new("payload", Some("orders".into()));
        assert_eq!(ex.route(&msg).unwrap(), 1);
        assert_eq!(q.depth(), 1);

        ex.set_kind(ExchangeKind::Fanout).unwrap();
        assert_eq!(ex.kind(), ExchangeKind::Fanout);
        assert_eq!(ex.binding_count(), 1);
        // the queued message survived the reconfiguration
        assert_eq!(q.depth(), 1);

        let msg = Message::new("payload", Some("does.not.matter".into()));
        assert_eq!(ex.route(&msg).unwrap(), 1);
        assert_eq!(q.depth(), 2);
    }
}
