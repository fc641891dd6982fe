//! Named periodic tasks.
//!
//! A schedule sends an [`AlarmFire`] into an unbounded channel every period,
//! first one period after creation. Creating a schedule under an existing
//! name replaces it, so at most one schedule per name is ever active.
//!
//! Fires already queued when a schedule is cleared or replaced still reach
//! the receiver; [`Scheduler::is_current`] tells them apart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// One tick of a named schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmFire {
    pub name: String,
    /// Identifies the `create` call that produced this fire.
    pub generation: u64,
}

impl AlarmFire {
    pub fn new(name: &str, generation: u64) -> Self {
        Self {
            name: name.to_string(),
            generation,
        }
    }
}

/// Periodic alarm host.
pub trait Scheduler: Send + Sync {
    /// Creates or replaces the schedule `name` firing every `period`.
    fn create(&self, name: &str, period: Duration);
    /// Cancels `name`. Returns true when a schedule existed.
    fn clear(&self, name: &str) -> bool;
    fn is_scheduled(&self, name: &str) -> bool;
    fn period(&self, name: &str) -> Option<Duration>;
    /// True when `fire` belongs to the schedule currently active under its
    /// name, false for fires of a cleared or replaced schedule.
    fn is_current(&self, fire: &AlarmFire) -> bool;
}

struct Entry {
    period: Duration,
    generation: u64,
    task: JoinHandle<()>,
}

/// Scheduler backed by one tokio interval task per schedule.
pub struct TokioScheduler {
    entries: Mutex<HashMap<String, Entry>>,
    fires: mpsc::UnboundedSender<AlarmFire>,
    generations: AtomicU64,
}

impl TokioScheduler {
    /// Returns the scheduler and the receiving end of its fires.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AlarmFire>) {
        let (fires, rx) = mpsc::unbounded_channel();
        (
            Self {
                entries: Mutex::new(HashMap::new()),
                fires,
                generations: AtomicU64::new(0),
            },
            rx,
        )
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn create(&self, name: &str, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        let fires = self.fires.clone();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let alarm = AlarmFire::new(name, generation);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if fires.send(alarm.clone()).is_err() {
                    break;
                }
            }
        });

        let previous = self
            .entries()
            .insert(name.to_string(), Entry { period, generation, task });
        if let Some(old) = previous {
            old.task.abort();
        }
        tracing::info!(alarm = name, generation, period_secs = period.as_secs(), "Schedule created");
    }

    fn clear(&self, name: &str) -> bool {
        match self.entries().remove(name) {
            Some(entry) => {
                entry.task.abort();
                tracing::info!(alarm = name, "Schedule cleared");
                true
            }
            None => false,
        }
    }

    fn is_scheduled(&self, name: &str) -> bool {
        self.entries().contains_key(name)
    }

    fn period(&self, name: &str) -> Option<Duration> {
        self.entries().get(name).map(|entry| entry.period)
    }

    fn is_current(&self, fire: &AlarmFire) -> bool {
        self.entries()
            .get(&fire.name)
            .map(|entry| entry.generation == fire.generation)
            .unwrap_or(false)
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, entry) in self.entries().drain() {
            entry.task.abort();
        }
    }
}
