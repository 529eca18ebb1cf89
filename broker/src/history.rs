use internals::Message;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;
use uuid::Uuid;

/// Upper bound on the retained per-message list handed to display
/// collaborators. Event counters used by the metrics aggregator are not
/// capped.
pub const MAX_MESSAGE_HISTORY: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Produced,
    Consumed,
}

/// One produced or consumed transition, timestamped for the aggregator.
#[derive(Clone, Debug)]
pub struct HistoryEvent {
    pub kind: EventKind,
    pub message_id: Uuid,
    /// Set for consumed events; produced events are not yet tied to a queue.
    pub queue_name: Option<String>,
    pub at: SystemTime,
}

/// Append-only record of broker activity. Writers are the exchange facade
/// (produced) and the consumer loop (consumed); the metrics aggregator only
/// ever reads snapshots.
#[derive(Default)]
pub struct MessageHistory {
    events: Mutex<Vec<HistoryEvent>>,
    recent: Mutex<VecDeque<Message>>,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_produced(&self, msg: &Message) {
        self.push_event(HistoryEvent {
            kind: EventKind::Produced,
            message_id: msg.uuid,
            queue_name: None,
            at: msg.created_at,
        });
        self.push_recent(msg.clone());
    }

    pub fn record_consumed(&self, msg: &Message, queue_name: &str) {
        self.push_event(HistoryEvent {
            kind: EventKind::Consumed,
            message_id: msg.uuid,
            queue_name: Some(queue_name.to_owned()),
            at: SystemTime::now(),
        });
        self.push_recent(msg.clone());
    }

    /// Snapshot of all recorded events, oldest first.
    pub fn events(&self) -> Vec<HistoryEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// The most recent messages seen by the broker, newest first, capped at
    /// [`MAX_MESSAGE_HISTORY`].
    pub fn recent_messages(&self) -> Vec<Message> {
        self.recent
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn push_event(&self, event: HistoryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn push_recent(&self, msg: Message) {
        if let Ok(mut recent) = self.recent.lock() {
            recent.push_front(msg);
            recent.truncate(MAX_MESSAGE_HISTORY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_produced_and_consumed_events() {
        let history = MessageHistory::new();
        let mut msg = Message::new("payload", Some("a".into()));
        history.record_produced(&msg);
        msg.mark_consumed();
        history.record_consumed(&msg, "q");

        let events = history.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Produced);
        assert_eq!(events[0].queue_name, None);
        assert_eq!(events[1].kind, EventKind::Consumed);
        assert_eq!(events[1].queue_name.as_deref(), Some("q"));
    }

    #[test]
    fn recent_messages_are_capped() {
        let history = MessageHistory::new();
        for i in 0..(MAX_MESSAGE_HISTORY + 20) {
            history.record_produced(&Message::new(format!("m{i}"), None));
        }
        let recent = history.recent_messages();
        assert_eq!(recent.len(), MAX_MESSAGE_HISTORY);
        // newest first
        assert_eq!(recent[0].payload, format!("m{}", MAX_MESSAGE_HISTORY + 19));
        // the event record itself is not capped
        assert_eq!(history.events().len(), MAX_MESSAGE_HISTORY + 20);
    }
}
