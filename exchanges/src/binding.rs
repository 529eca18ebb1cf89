use queues::Queue;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A rule associating a queue with a routing pattern. One queue may be bound
/// under several patterns, so identity is the (pattern, queue name) pair.
#[derive(Clone)]
pub struct Binding {
    pub pattern: String,
    pub queue: Arc<Queue>,
}

impl Binding {
    pub fn new(pattern: impl Into<String>, queue: Arc<Queue>) -> Self {
        Self {
            pattern: pattern.into(),
            queue,
        }
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.queue.name == other.queue.name
    }
}

impl Eq for Binding {}

impl Hash for Binding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
        self.queue.name.hash(state);
    }
}
