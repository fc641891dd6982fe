//! Trailing-edge debouncing for async work.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs only the last of a burst of calls, `delay` after that call.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedules `work`, cancelling whatever was scheduled before.
    pub fn call<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        if let Some(previous) = self.slot().replace(task) {
            previous.abort();
        }
    }

    /// Drops any scheduled work.
    pub fn cancel(&self) {
        if let Some(previous) = self.slot().take() {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
