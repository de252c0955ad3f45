//! Process-wide shutdown signal.
//!
//! A single [`ShutdownTx`] is owned by whoever decides to stop the pipeline (the signal handler or
//! a failing worker) and every worker holds a [`ShutdownRx`]. The signal is level triggered:
//! receivers created after the signal fired still observe it.

use tokio::sync::watch;

/// Sending side of the shutdown signal. Cloning shares the same signal.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Fires the signal. Calling it more than once has no further effect.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    /// Returns a new receiver observing this signal.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiving side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Completes once the signal fired.
    ///
    /// Cancel safe, so it can be used as a `tokio::select!` branch. Also completes when every
    /// [`ShutdownTx`] was dropped, since nobody is left to keep the pipeline running.
    pub async fn wait_for_shutdown(&mut self) {
        let _ = self.0.wait_for(|shutdown| *shutdown).await;
    }
}

/// Creates a connected shutdown sender and receiver.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn receivers_observe_shutdown() {
        let (tx, mut rx) = create_shutdown_channel();
        assert!(!*rx.0.borrow());

        let waiter = tokio::spawn(async move {
            rx.wait_for_shutdown().await;
        });

        tx.shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(*tx.0.borrow());
    }

    #[tokio::test]
    async fn late_subscribers_observe_shutdown() {
        let (tx, _rx) = create_shutdown_channel();
        tx.shutdown();
        tx.shutdown();

        let mut late = tx.subscribe();
        assert!(*late.0.borrow());
        tokio::time::timeout(Duration::from_secs(1), late.wait_for_shutdown())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dropping_all_senders_releases_waiters() {
        let (tx, mut rx) = create_shutdown_channel();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), rx.wait_for_shutdown())
            .await
            .unwrap();
    }
}
