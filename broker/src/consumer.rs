use internals::{BrokerError, Message};
use queues::Queue;
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info, warn};

use crate::history::MessageHistory;

pub const MIN_PROCESSING_DELAY: Duration = Duration::from_millis(1000);
pub const MAX_PROCESSING_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_PROCESSING_DELAY: Duration = Duration::from_millis(2000);

/// Fixed sub-delay standing in for the actual consumption work.
const PROCESSING_WORK_DELAY: Duration = Duration::from_millis(500);
/// How often an active consumer re-checks an empty queue.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);
const HEALTH_DRIFT_INTERVAL: Duration = Duration::from_secs(5);
const IDLE_DECAY_INTERVAL: Duration = Duration::from_secs(2);
const AUTOSCALE_STEP: Duration = Duration::from_millis(500);

/// Below this health value errors may be injected into the stats.
const DEGRADED_HEALTH_THRESHOLD: u8 = 80;
const MIN_HEALTH: u8 = 70;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerStatus {
    /// Inactive, or active with an empty queue.
    Idle,
    /// Timer armed; a message will be picked up when it fires.
    Waiting,
    /// Mid-dequeue, inside the fixed work sub-delay.
    Processing,
    /// Transient marker after an injected error; processing continues.
    Errored,
}

/// Snapshot of the consumer's observable state.
#[derive(Clone, Debug)]
pub struct ConsumerStats {
    pub is_active: bool,
    pub status: ConsumerStatus,
    pub processing_delay: Duration,
    pub auto_scale: bool,
    pub health: u8,
    pub processed_count: u64,
    pub error_count: u64,
    pub avg_processing_ms: f64,
    pub cpu: u8,
    pub memory: u8,
}

struct State {
    status: ConsumerStatus,
    processing_delay: Duration,
    auto_scale: bool,
    health: u8,
    processed_count: u64,
    error_count: u64,
    avg_processing_ms: f64,
    cpu: u8,
    memory: u8,
}

impl Default for State {
    fn default() -> Self {
        Self {
            status: ConsumerStatus::Idle,
            processing_delay: DEFAULT_PROCESSING_DELAY,
            auto_scale: false,
            health: 100,
            processed_count: 0,
            error_count: 0,
            avg_processing_ms: 0.0,
            cpu: 10,
            memory: 15,
        }
    }
}

type Shared = Arc<Mutex<State>>;

/// Control-plane handle for one queue's consumer loop. Dropping the handle
/// aborts the background task.
pub struct ConsumerHandle {
    queue: Arc<Queue>,
    shared: Shared,
    active_tx: watch::Sender<bool>,
    events_tx: broadcast::Sender<Message>,
    history: Arc<MessageHistory>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub(crate) fn spawn(queue: Arc<Queue>, history: Arc<MessageHistory>) -> Self {
        let (active_tx, active_rx) = watch::channel(true);
        let (events_tx, _) = broadcast::channel(64);
        let shared: Shared = Arc::new(Mutex::new(State::default()));

        info!(queue_name = %queue.name, "spawning consumer loop");
        let task = tokio::spawn(run_loop(
            Arc::clone(&queue),
            active_rx,
            Arc::clone(&shared),
            events_tx.clone(),
            Arc::clone(&history),
        ));

        Self {
            queue,
            shared,
            active_tx,
            events_tx,
            history,
            task,
        }
    }

    /// Activates or deactivates the loop. Deactivation cancels any armed
    /// timer: no message is consumed afterwards, the backlog stays put.
    pub fn set_active(&self, active: bool) {
        let changed = self.active_tx.send_if_modified(|current| {
            if *current != active {
                *current = active;
                true
            } else {
                false
            }
        });
        if changed {
            info!(queue_name = %self.queue.name, active, "consumer state changed");
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active_tx.borrow()
    }

    /// Sets the per-message delay. The change applies to the next wait
    /// cycle only; a timer already armed keeps its original deadline.
    pub fn set_processing_delay(&self, delay: Duration) -> Result<(), BrokerError> {
        if !(MIN_PROCESSING_DELAY..=MAX_PROCESSING_DELAY).contains(&delay) {
            return Err(BrokerError::InvalidConsumerConfig(format!(
                "processing delay {}ms out of range [{}ms, {}ms]",
                delay.as_millis(),
                MIN_PROCESSING_DELAY.as_millis(),
                MAX_PROCESSING_DELAY.as_millis()
            )));
        }
        if let Ok(mut state) = self.shared.lock() {
            state.processing_delay = delay;
        }
        Ok(())
    }

    pub fn processing_delay(&self) -> Duration {
        self.shared
            .lock()
            .map(|s| s.processing_delay)
            .unwrap_or(DEFAULT_PROCESSING_DELAY)
    }

    pub fn set_auto_scale(&self, enabled: bool) {
        if let Ok(mut state) = self.shared.lock() {
            state.auto_scale = enabled;
        }
    }

    pub fn stats(&self) -> ConsumerStats {
        let is_active = self.is_active();
        match self.shared.lock() {
            Ok(state) => ConsumerStats {
                is_active,
                status: state.status,
                processing_delay: state.processing_delay,
                auto_scale: state.auto_scale,
                health: state.health,
                processed_count: state.processed_count,
                error_count: state.error_count,
                avg_processing_ms: state.avg_processing_ms,
                cpu: state.cpu,
                memory: state.memory,
            },
            Err(_) => {
                warn!("consumer state mutex poisoned");
                ConsumerStats {
                    is_active,
                    status: ConsumerStatus::Idle,
                    processing_delay: DEFAULT_PROCESSING_DELAY,
                    auto_scale: false,
                    health: 0,
                    processed_count: 0,
                    error_count: 0,
                    avg_processing_ms: 0.0,
                    cpu: 0,
                    memory: 0,
                }
            }
        }
    }

    /// One consumed event per dequeue, pushed to every subscriber.
    pub fn subscribe(&self) -> BroadcastStream<Message> {
        BroadcastStream::new(self.events_tx.subscribe())
    }

    /// Consumes the whole backlog synchronously, in arrival order, bypassing
    /// the per-message delay. Works whether or not the loop is active.
    pub fn drain_all(&self) -> Result<u64, BrokerError> {
        info!(queue_name = %self.queue.name, "draining all queued messages");
        let mut drained = 0u64;
        while let Some(msg) = self.queue.dequeue()? {
            consume_one(
                &self.shared,
                &self.history,
                &self.events_tx,
                &self.queue.name,
                msg,
                None,
            );
            drained += 1;
        }
        info!(queue_name = %self.queue.name, drained, "drain completed");
        Ok(drained)
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Marks a message consumed, updates the stats, and fans the event out.
/// `timing_sample_ms` is `None` for bulk drains, which bypass the delay and
/// therefore contribute nothing to the average.
fn consume_one(
    shared: &Shared,
    history: &MessageHistory,
    events_tx: &broadcast::Sender<Message>,
    queue_name: &str,
    mut msg: Message,
    timing_sample_ms: Option<f64>,
) {
    msg.mark_consumed();
    if let Ok(mut state) = shared.lock() {
        state.processed_count += 1;
        if let Some(ms) = timing_sample_ms {
            let n = state.processed_count as f64;
            state.avg_processing_ms = (state.avg_processing_ms * (n - 1.0) + ms) / n;
        }
        // degraded health makes recorded errors more likely; the message
        // itself is never lost
        if state.health < DEGRADED_HEALTH_THRESHOLD && rand::thread_rng().gen::<f64>() > 0.7 {
            state.error_count += 1;
            state.status = ConsumerStatus::Errored;
            warn!(queue_name, error_count = state.error_count, "simulated consumer error");
        }
    }
    history.record_consumed(&msg, queue_name);
    // no subscribers is fine
    let _ = events_tx.send(msg);
}

fn set_status(shared: &Shared, status: ConsumerStatus) {
    if let Ok(mut state) = shared.lock() {
        state.status = status;
    }
}

fn drift_health(shared: &Shared) {
    let mut rng = rand::thread_rng();
    let change: i16 = if rng.gen::<f64>() > 0.7 {
        -rng.gen_range(0..5)
    } else {
        rng.gen_range(0..2)
    };
    if let Ok(mut state) = shared.lock() {
        state.health = (state.health as i16 + change).clamp(MIN_HEALTH as i16, 100) as u8;
    }
}

fn bump_resources(shared: &Shared, depth: usize) {
    if let Ok(mut state) = shared.lock() {
        let cpu_change = if depth > 5 { 5 } else { 2 };
        state.cpu = (state.cpu + cpu_change).min(95);
        state.memory = (state.memory + 1).min(90);
    }
}

fn decay_resources(shared: &Shared) {
    if let Ok(mut state) = shared.lock() {
        state.cpu = state.cpu.saturating_sub(2).max(10);
        state.memory = state.memory.saturating_sub(1).max(15);
    }
}

/// Advisory control loop: nudges the delay towards its bounds when the
/// backlog and simulated resource usage suggest it.
fn maybe_autoscale(shared: &Shared, depth: usize) {
    if let Ok(mut state) = shared.lock() {
        if !state.auto_scale {
            return;
        }
        if depth > 5 && state.cpu > 70 && state.processing_delay > Duration::from_millis(1500) {
            state.processing_delay =
                (state.processing_delay - AUTOSCALE_STEP).max(MIN_PROCESSING_DELAY);
            info!(
                delay_ms = state.processing_delay.as_millis() as u64,
                "auto-scaling: increased processing speed"
            );
        } else if depth == 0 && state.cpu < 30 && state.processing_delay < Duration::from_millis(4000)
        {
            state.processing_delay =
                (state.processing_delay + AUTOSCALE_STEP).min(MAX_PROCESSING_DELAY);
            info!(
                delay_ms = state.processing_delay.as_millis() as u64,
                "auto-scaling: decreased processing speed to save resources"
            );
        }
    }
}

async fn run_loop(
    queue: Arc<Queue>,
    mut active_rx: watch::Receiver<bool>,
    shared: Shared,
    events_tx: broadcast::Sender<Message>,
    history: Arc<MessageHistory>,
) {
    let mut last_drift = Instant::now();
    let mut last_decay = Instant::now();

    loop {
        if last_drift.elapsed() >= HEALTH_DRIFT_INTERVAL {
            drift_health(&shared);
            last_drift = Instant::now();
        }

        if !*active_rx.borrow() {
            set_status(&shared, ConsumerStatus::Idle);
            // handle dropped means shutdown
            if active_rx.changed().await.is_err() {
                return;
            }
            continue;
        }

        if queue.is_empty() {
            set_status(&shared, ConsumerStatus::Idle);
            if last_decay.elapsed() >= IDLE_DECAY_INTERVAL {
                decay_resources(&shared);
                last_decay = Instant::now();
            }
            maybe_autoscale(&shared, 0);
            tokio::select! {
                biased;
                res = active_rx.changed() => {
                    if res.is_err() {
                        return;
                    }
                }
                _ = sleep(IDLE_POLL_INTERVAL) => {}
            }
            continue;
        }

        // the delay is read once, when the timer is armed; changes apply to
        // the next wait cycle only
        set_status(&shared, ConsumerStatus::Waiting);
        let delay = shared
            .lock()
            .map(|s| s.processing_delay)
            .unwrap_or(DEFAULT_PROCESSING_DELAY);

        // biased: the deactivation arm is checked before the timer, so an
        // already-fired timer can never consume a message past deactivation
        tokio::select! {
            biased;
            res = active_rx.changed() => {
                if res.is_err() {
                    return;
                }
                continue;
            }
            _ = sleep(delay) => {}
        }

        set_status(&shared, ConsumerStatus::Processing);
        tokio::select! {
            biased;
            res = active_rx.changed() => {
                if res.is_err() {
                    return;
                }
                continue;
            }
            _ = sleep(PROCESSING_WORK_DELAY) => {}
        }
        if !*active_rx.borrow() {
            continue;
        }

        match queue.dequeue() {
            Ok(Some(msg)) => {
                let sample = (delay + PROCESSING_WORK_DELAY).as_millis() as f64;
                consume_one(&shared, &history, &events_tx, &queue.name, msg, Some(sample));
                bump_resources(&shared, queue.depth());
                maybe_autoscale(&shared, queue.depth());
            }
            // drained concurrently (bulk processing); nothing left to do
            Ok(None) => {}
            Err(e) => {
                error!(queue_name = %queue.name, error = %e, "dequeue failed");
            }
        }
    }
}
