//! Module to control shutdown in dummy-graphite.
//!
//! The generator runs until it has sent the configured number of metrics, or
//! until the operator interrupts it. The latter is communicated through
//! [`Shutdown`]: every participant holds a clone and waits on it alongside
//! its own work.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug)]
/// Mechanism to control shutdown in dummy-graphite.
///
/// The signal is one-shot and sticky. Once sent, every existing and future
/// clone observes it.
pub struct Shutdown {
    /// Sending half, shared by all clones derived from the same root.
    sender: Arc<watch::Sender<bool>>,
    /// Receiving half, one per instance.
    receiver: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// Create a new `Shutdown` instance. Further instances that should
    /// observe the same signal are created through clones.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Wait for the shutdown signal. Returns immediately if the signal has
    /// already been sent.
    pub async fn recv(&mut self) {
        // The sender lives as long as `self`, so the channel cannot close
        // while we wait.
        let _ = self.receiver.wait_for(|signaled| *signaled).await;
    }

    /// Whether the shutdown signal has been sent.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Send the shutdown signal to this and all derived `Shutdown` instances.
    pub fn signal(&self) {
        self.sender.send_replace(true);
    }
}

impl Clone for Shutdown {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
            receiver: self.sender.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{Duration, timeout};

    use super::Shutdown;

    #[tokio::test]
    async fn recv_waits_for_signal() {
        let mut shutdown = Shutdown::new();
        assert!(!shutdown.is_signaled());
        assert!(
            timeout(Duration::from_millis(50), shutdown.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn signal_reaches_every_clone() {
        let root = Shutdown::new();
        let mut early = root.clone();
        let waiter = tokio::spawn(async move { early.recv().await });

        root.signal();
        timeout(Duration::from_secs(5), waiter)
            .await
            .expect("clone did not observe signal")
            .expect("waiter panicked");

        // Clones made after the fact see the signal as well.
        let mut late = root.clone();
        assert!(late.is_signaled());
        timeout(Duration::from_secs(5), late.recv())
            .await
            .expect("late clone did not observe signal");
    }

    #[tokio::test]
    async fn recv_is_repeatable() {
        let mut shutdown = Shutdown::new();
        shutdown.signal();
        shutdown.recv().await;
        shutdown.recv().await;
        assert!(shutdown.is_signaled());
    }
}
