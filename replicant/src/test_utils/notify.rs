use std::time::Duration;
use std::{fmt, sync::Arc};

use tokio::sync::Notify;
use tokio::time::timeout;

/// Default timeout for waiting on a condition.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`Notify`] paired with a timeout, used to wait for state changes of test doubles.
#[derive(Clone)]
pub struct TimedNotify {
    notify: Arc<Notify>,
    timeout_duration: Duration,
}

impl TimedNotify {
    pub fn new(notify: Arc<Notify>) -> Self {
        Self::with_timeout(notify, DEFAULT_NOTIFY_TIMEOUT)
    }

    pub fn with_timeout(notify: Arc<Notify>, timeout_duration: Duration) -> Self {
        Self {
            notify,
            timeout_duration,
        }
    }

    /// Waits until `condition` holds, re-checking it after every notification.
    ///
    /// # Panics
    ///
    /// Panics if the condition does not hold within the timeout.
    pub async fn wait_until<F>(&self, mut condition: F)
    where
        F: FnMut() -> bool,
    {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                // Registers interest before checking so a notification in between is not lost.
                notified.as_mut().enable();

                if condition() {
                    return;
                }

                notified.await;
            }
        };

        if timeout(self.timeout_duration, wait).await.is_err() {
            panic!(
                "Test condition was not reached after {:?}",
                self.timeout_duration
            );
        }
    }

    pub fn notify(&self) {
        self.notify.notify_waiters();
    }

    pub fn inner(&self) -> &Arc<Notify> {
        &self.notify
    }
}

impl Default for TimedNotify {
    fn default() -> Self {
        Self::new(Arc::new(Notify::new()))
    }
}

impl fmt::Debug for TimedNotify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedNotify")
            .field("timeout_duration", &self.timeout_duration)
            .finish()
    }
}
