use std::time::SystemTime;
use uuid::Uuid;

/// Delivery state of a message. Transitions are strictly monotonic:
/// `Pending` -> `Delivered` -> `Consumed`, never backwards.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum MessageStatus {
    Pending,
    Delivered,
    Consumed,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Delivered => write!(f, "delivered"),
            MessageStatus::Consumed => write!(f, "consumed"),
        }
    }
}

/// One unit of data in transit. The payload is opaque to the broker;
/// routing decisions only ever look at the routing key.
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
    pub uuid: Uuid,
    pub payload: String,
    pub routing_key: Option<String>,
    pub created_at: SystemTime,
    status: MessageStatus,
}

impl Message {
    pub fn new(payload: impl Into<String>, routing_key: Option<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            payload: payload.into(),
            routing_key,
            created_at: SystemTime::now(),
            status: MessageStatus::Pending,
        }
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }

    /// Advances the status, keeping the current one if it is already further along.
    pub fn advance_status(&mut self, status: MessageStatus) {
        self.status = self.status.max(status);
    }

    pub fn mark_delivered(&mut self) {
        self.advance_status(MessageStatus::Delivered);
    }

    pub fn mark_consumed(&mut self) {
        self.advance_status(MessageStatus::Consumed);
    }
}
