//! Read-side projections over the message history. Nothing here mutates
//! broker state; `now` is always passed in so the math stays deterministic
//! under a paused test clock.

use crate::history::{EventKind, HistoryEvent};
use std::time::{Duration, SystemTime};

/// Instantaneous and trailing-average message rates.
///
/// Per-minute values count events in the last 60 seconds; the averages
/// spread the last 300 seconds over 5, rounded to one decimal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rates {
    pub produced_per_min: u64,
    pub produced_avg_per_min: f64,
    pub consumed_per_min: u64,
    pub consumed_avg_per_min: f64,
}

/// Charting window for [`time_series`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Window {
    LastHour,
    LastDay,
    LastWeek,
}

impl Window {
    /// Number of steps; the series carries one point per step plus the
    /// current one.
    fn steps(&self) -> usize {
        match self {
            Window::LastHour => 12,
            Window::LastDay => 24,
            Window::LastWeek => 28,
        }
    }

    fn step(&self) -> Duration {
        match self {
            Window::LastHour => Duration::from_secs(5 * 60),
            Window::LastDay => Duration::from_secs(60 * 60),
            Window::LastWeek => Duration::from_secs(6 * 60 * 60),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimePoint {
    pub timestamp: SystemTime,
    pub produced: u64,
    pub consumed: u64,
    pub queue_depth: u64,
}

fn count_since(events: &[HistoryEvent], kind: EventKind, cutoff: SystemTime) -> u64 {
    events
        .iter()
        .filter(|e| e.kind == kind && e.at > cutoff)
        .count() as u64
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn rates(events: &[HistoryEvent], now: SystemTime) -> Rates {
    let minute_ago = now - Duration::from_secs(60);
    let five_minutes_ago = now - Duration::from_secs(300);

    Rates {
        produced_per_min: count_since(events, EventKind::Produced, minute_ago),
        produced_avg_per_min: round_tenth(
            count_since(events, EventKind::Produced, five_minutes_ago) as f64 / 5.0,
        ),
        consumed_per_min: count_since(events, EventKind::Consumed, minute_ago),
        consumed_avg_per_min: round_tenth(
            count_since(events, EventKind::Consumed, five_minutes_ago) as f64 / 5.0,
        ),
    }
}

/// Buckets the history into an ordered series over the requested window.
///
/// Each point counts the events whose timestamp falls inside its bucket.
/// Queue depth is reconstructed backwards from the live `queue_depth` using
/// the per-bucket produced/consumed delta, clamped at zero.
pub fn time_series(
    events: &[HistoryEvent],
    queue_depth: usize,
    window: Window,
    now: SystemTime,
) -> Vec<TimePoint> {
    let step = window.step();
    let steps = window.steps();

    let mut series: Vec<TimePoint> = (0..=steps)
        .map(|i| {
            let end = now - step * (steps - i) as u32;
            let start = end - step;
            let in_bucket = |kind: EventKind| {
                events
                    .iter()
                    .filter(|e| e.kind == kind && e.at > start && e.at <= end)
                    .count() as u64
            };
            TimePoint {
                timestamp: end,
                produced: in_bucket(EventKind::Produced),
                consumed: in_bucket(EventKind::Consumed),
                queue_depth: 0,
            }
        })
        .collect();

    let mut depth = queue_depth as i64;
    for i in (0..series.len()).rev() {
        series[i].queue_depth = depth.max(0) as u64;
        depth -= series[i].produced as i64 - series[i].consumed as i64;
    }

    series
}
