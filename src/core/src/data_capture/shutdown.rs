use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

/// One-way stop signal shared by the controller and the capture task.
///
/// The flag lives under a mutex; waiters park on a [`Notify`]. Once
/// signaled, the flag is never cleared.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    stopped: Mutex<bool>,
    notify: Notify,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every current waiter. Idempotent.
    pub fn signal(&self) {
        *self.flag() = true;
        self.inner.notify.notify_waiters();
    }

    pub fn is_signaled(&self) -> bool {
        *self.flag()
    }

    /// Completes once [`signal`](Self::signal) has been called, immediately
    /// if it already was.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a signal in between is not lost.
            notified.as_mut().enable();
            if self.is_signaled() {
                return;
            }
            notified.await;
        }
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        // A bool can't be left half-written; a poisoned guard is still valid.
        self.inner
            .stopped
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
