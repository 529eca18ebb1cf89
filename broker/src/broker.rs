use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use exchanges::Exchange;
use internals::{BrokerConfig, BrokerError, ExchangeKind, Message, PersistenceMode};
use queues::{Queue, QueueName};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::consumer::ConsumerHandle;
use crate::history::MessageHistory;
use crate::metrics::{self, Rates, TimePoint, Window};

/// Outcome of a publish. `delivered_count == 0` means no binding matched and
/// the message was dropped fire-and-forget style; it is not an error and the
/// caller can tell it apart from a structural failure.
#[derive(Clone, Debug)]
pub struct PublishReceipt {
    pub message: Message,
    pub delivered_count: u32,
}

impl PublishReceipt {
    pub fn message_id(&self) -> Uuid {
        self.message.uuid
    }
}

/// The broker facade: queue topology, the exchange, publish, and the
/// read-only metrics queries. One instance per broker configuration.
pub struct Broker {
    config: BrokerConfig,
    queues: DashMap<QueueName, Arc<Queue>>,
    exchange: Arc<Exchange>,
    history: Arc<MessageHistory>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        if config.persistence == PersistenceMode::Disk {
            warn!("disk persistence is not implemented, keeping everything in memory");
        }
        info!(exchange_type = %config.exchange_type, "creating broker");
        let exchange = Arc::new(Exchange::new("default", config.exchange_type));
        Self {
            config,
            queues: DashMap::new(),
            exchange,
            history: Arc::new(MessageHistory::new()),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn exchange_kind(&self) -> ExchangeKind {
        self.exchange.kind()
    }

    /// Changes the routing semantics in place; bindings and queued messages
    /// are untouched.
    pub fn set_exchange_kind(&self, kind: ExchangeKind) -> Result<(), BrokerError> {
        self.exchange.set_kind(kind)
    }

    #[instrument(skip_all, fields(queue_name = %queue_name))]
    pub fn add_queue(&self, queue_name: &str) -> Result<Arc<Queue>, BrokerError> {
        info!("adding queue");
        match self.queues.entry(queue_name.to_owned()) {
            Entry::Occupied(_) => {
                warn!("queue already exists");
                Err(BrokerError::QueueAlreadyExists(queue_name.to_owned()))
            }
            Entry::Vacant(entry) => {
                let queue = Arc::new(Queue::new(queue_name));
                entry.insert(Arc::clone(&queue));
                info!("queue added");
                Ok(queue)
            }
        }
    }

    /// Removes a queue. Rejected with `QueueInUse` while any binding still
    /// references it; unbind first.
    #[instrument(skip_all, fields(queue_name = %queue_name))]
    pub fn remove_queue(&self, queue_name: &str) -> Result<(), BrokerError> {
        info!("removing queue");
        let bindings = self.exchange.bindings_for(queue_name);
        if bindings > 0 {
            warn!(bindings, "queue is still bound to the exchange");
            return Err(BrokerError::QueueInUse {
                queue: queue_name.to_owned(),
                bindings,
            });
        }
        if self.queues.remove(queue_name).is_none() {
            warn!("queue does not exist");
            return Err(BrokerError::QueueNotFound(queue_name.to_owned()));
        }
        info!("queue removed");
        Ok(())
    }

    pub fn get_queue(&self, queue_name: &str) -> Result<Arc<Queue>, BrokerError> {
        self.queues
            .get(queue_name)
            .map(|q| Arc::clone(&q))
            .ok_or_else(|| BrokerError::QueueNotFound(queue_name.to_owned()))
    }

    pub fn queue_names(&self) -> Vec<QueueName> {
        self.queues.iter().map(|q| q.key().clone()).collect()
    }

    pub fn queue_depth(&self, queue_name: &str) -> Result<usize, BrokerError> {
        Ok(self.get_queue(queue_name)?.depth())
    }

    #[instrument(skip_all, fields(queue_name = %queue_name, pattern = %pattern))]
    pub fn bind_queue(&self, queue_name: &str, pattern: &str) -> Result<(), BrokerError> {
        info!("started binding");
        let queue = self.get_queue(queue_name)?;
        self.exchange.bind(queue, pattern)?;
        info!("binding completed");
        Ok(())
    }

    #[instrument(skip_all, fields(queue_name = %queue_name, pattern = %pattern))]
    pub fn unbind_queue(&self, queue_name: &str, pattern: &str) -> Result<(), BrokerError> {
        // the queue must exist even if the binding does not
        self.get_queue(queue_name)?;
        self.exchange.unbind(queue_name, pattern);
        Ok(())
    }

    /// Routes a new message per the exchange kind. The returned receipt
    /// carries the message with its final status: `Delivered` after reaching
    /// at least one queue, still `Pending` when nothing matched.
    #[instrument(skip_all, fields(routing_key = %routing_key))]
    pub fn publish(
        &self,
        routing_key: &str,
        payload: impl Into<String>,
    ) -> Result<PublishReceipt, BrokerError> {
        let key = (!routing_key.is_empty()).then(|| routing_key.to_owned());
        let mut message = Message::new(payload, key);
        info!(uuid = %message.uuid, "publishing message");

        let delivered_count = self.exchange.route(&message)?;
        if delivered_count > 0 {
            message.mark_delivered();
        } else {
            info!("no binding matched, message dropped");
        }
        self.history.record_produced(&message);
        info!(delivered_count, "message handling completed");

        Ok(PublishReceipt {
            message,
            delivered_count,
        })
    }

    /// Clears every queue, returning the number of discarded messages.
    pub fn purge_queues(&self) -> usize {
        let discarded: usize = self.queues.iter().map(|q| q.purge()).sum();
        info!(discarded, "purged all queues");
        discarded
    }

    pub fn history(&self) -> Arc<MessageHistory> {
        Arc::clone(&self.history)
    }

    /// Produced/consumed rates over the trailing 60s/300s windows.
    pub fn rates(&self, now: SystemTime) -> Rates {
        metrics::rates(&self.history.events(), now)
    }

    /// Bucketed time series for one queue over the requested window.
    pub fn time_series(
        &self,
        queue_name: &str,
        window: Window,
        now: SystemTime,
    ) -> Result<Vec<TimePoint>, BrokerError> {
        let depth = self.queue_depth(queue_name)?;
        Ok(metrics::time_series(
            &self.history.events(),
            depth,
            window,
            now,
        ))
    }

    /// Spawns the consumer loop task for a queue. Requires a tokio runtime.
    pub fn spawn_consumer(&self, queue_name: &str) -> Result<ConsumerHandle, BrokerError> {
        let queue = self.get_queue(queue_name)?;
        Ok(ConsumerHandle::spawn(queue, Arc::clone(&self.history)))
    }
}
