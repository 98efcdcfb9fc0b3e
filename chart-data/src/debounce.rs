//! Trigger coalescing for bursty events such as terminal resizes.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

/// Default quiet period before a burst is considered settled.
pub const DEFAULT_QUIET: Duration = Duration::from_millis(250);

const TRIGGER_BUFFER: usize = 8;

/// Coalesces bursts of triggers into a single downstream fire.
///
/// Every trigger restarts the quiet window; the fire is delivered only once
/// no trigger has arrived for the full period. Dropping the debouncer (or
/// calling [`stop`](Debouncer::stop)) cancels any pending fire.
pub struct Debouncer {
    trigger_tx: mpsc::Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Returns the debouncer and the receiver its fires are delivered on.
    pub fn new(quiet: Duration) -> (Self, mpsc::Receiver<()>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_BUFFER);
        let (fire_tx, fire_rx) = mpsc::channel(1);
        let worker = tokio::spawn(run(trigger_rx, fire_tx, quiet));

        (
            Self {
                trigger_tx,
                worker: Some(worker),
            },
            fire_rx,
        )
    }

    /// Record one event of the burst, restarting the quiet window.
    pub fn trigger(&self) {
        // A full buffer means a window restart is already queued.
        let _ = self.trigger_tx.try_send(());
    }

    /// Cancel the worker; no fire is delivered after this returns.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(mut triggers: mpsc::Receiver<()>, fire_tx: mpsc::Sender<()>, quiet: Duration) {
    while triggers.recv().await.is_some() {
        loop {
            match timeout(quiet, triggers.recv()).await {
                // Burst continues, restart the window.
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => {
                    // An undelivered previous fire already signals the
                    // consumer, so coalesce.
                    let _ = fire_tx.try_send(());
                    debug!("debounce window settled after {:?}", quiet);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::yield_now;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_after_quiet_period() {
        let (debouncer, mut fired) = Debouncer::new(Duration::from_millis(250));

        debouncer.trigger();
        yield_now().await;
        advance(Duration::from_millis(100)).await;
        debouncer.trigger();
        yield_now().await;
        advance(Duration::from_millis(100)).await;
        debouncer.trigger();
        yield_now().await;

        advance(Duration::from_millis(250)).await;
        fired.recv().await.unwrap();
        assert!(fired.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_restarts_quiet_window() {
        let (debouncer, mut fired) = Debouncer::new(Duration::from_millis(250));

        debouncer.trigger();
        yield_now().await;
        advance(Duration::from_millis(200)).await;
        debouncer.trigger();
        yield_now().await;

        // 200ms into the restarted window: still quiet.
        advance(Duration::from_millis(200)).await;
        assert!(fired.try_recv().is_err());

        advance(Duration::from_millis(100)).await;
        assert!(fired.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_fire_separately() {
        let (debouncer, mut fired) = Debouncer::new(Duration::from_millis(250));

        debouncer.trigger();
        yield_now().await;
        advance(Duration::from_millis(300)).await;
        fired.recv().await.unwrap();

        debouncer.trigger();
        yield_now().await;
        advance(Duration::from_millis(300)).await;
        fired.recv().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_fire() {
        let (mut debouncer, mut fired) = Debouncer::new(Duration::from_millis(250));

        debouncer.trigger();
        yield_now().await;
        debouncer.stop();

        advance(Duration::from_millis(300)).await;
        yield_now().await;
        assert!(fired.try_recv().is_err());
    }
}
