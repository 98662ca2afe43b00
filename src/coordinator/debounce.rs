use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Trailing-edge debouncer.
///
/// Each call schedules its task after `delay`. A task only runs if no newer
/// call arrived while it was waiting; once running it is never interrupted
/// by later calls.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    latest: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `task`. The handle resolves to `None` if the task was
    /// superseded before its delay elapsed.
    pub fn call<F, T>(&self, task: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = self.latest.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if latest.load(Ordering::SeqCst) != ticket {
                return None;
            }
            Some(task.await)
        })
    }
}
