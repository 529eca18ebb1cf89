use internals::{BrokerError, Message};
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use tracing::warn;

pub type QueueName = String;

/// Ordered FIFO holding area for messages awaiting consumption.
///
/// The buffer is unbounded: while the consumer is inactive the backlog may
/// grow indefinitely, which is an accepted, observable condition surfaced
/// through `depth()` rather than by rejecting producers.
pub struct Queue {
    pub name: QueueName,
    buffer: Mutex<VecDeque<Message>>,
}

impl Queue {
    pub fn new(name: impl Into<QueueName>) -> Self {
        Self {
            name: name.into(),
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends a message, O(1). Arrival order equals insertion order.
    pub fn enqueue(&self, msg: Message) -> Result<(), BrokerError> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| BrokerError::Internal("queue mutex poisoned".to_string()))?;
        buffer.push_back(msg);
        Ok(())
    }

    /// Removes and returns the earliest-arrived message, or `None` when empty.
    pub fn dequeue(&self) -> Result<Option<Message>, BrokerError> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| BrokerError::Internal("queue mutex poisoned".to_string()))?;
        Ok(buffer.pop_front())
    }

    pub fn depth(&self) -> usize {
        match self.buffer.lock() {
            Ok(buffer) => buffer.len(),
            Err(_) => {
                warn!(queue_name = %self.name, "queue mutex poisoned, reporting depth 0");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Drops every queued message, returning how many were discarded.
    pub fn purge(&self) -> usize {
        match self.buffer.lock() {
            Ok(mut buffer) => {
                let discarded = buffer.len();
                buffer.clear();
                discarded
            }
            Err(_) => 0,
        }
    }
}

impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Queue {}

impl Hash for Queue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
