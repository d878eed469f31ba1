//! Inactivity watchdog.
//!
//! Every [`reset`](Heartbeat::reset) restarts a two-stage timer: after
//! `interval` of silence it signals [`Beat::Ping`], and if nothing resets it
//! within `grace` after that it signals [`Beat::Lost`]. Signals carry the
//! generation they were armed in so the owner can drop stale ones.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Beat {
    /// The line has been idle for the interval; probe it.
    Ping,
    /// The probe went unanswered.
    Lost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatSignal {
    pub generation: u64,
    pub beat: Beat,
}

#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    grace: Duration,
    signals: mpsc::UnboundedSender<HeartbeatSignal>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    stopped: bool,
}

impl Heartbeat {
    pub fn new(
        interval: Duration,
        grace: Duration,
        signals: mpsc::UnboundedSender<HeartbeatSignal>,
    ) -> Self {
        Self {
            interval,
            grace,
            signals,
            generation: 0,
            timer: None,
            stopped: false,
        }
    }

    /// Restart the timer. No effect after [`stop`](Self::stop).
    pub fn reset(&mut self) {
        if self.stopped {
            return;
        }
        self.cancel_timer();
        let generation = self.generation;
        let (interval, grace) = (self.interval, self.grace);
        let signals = self.signals.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let ping = HeartbeatSignal {
                generation,
                beat: Beat::Ping,
            };
            if signals.send(ping).is_err() {
                return;
            }
            tokio::time::sleep(grace).await;
            let _ = signals.send(HeartbeatSignal {
                generation,
                beat: Beat::Lost,
            });
        }));
    }

    /// Disarm permanently.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.cancel_timer();
    }

    /// Whether `signal` belongs to the currently armed timer.
    pub fn is_current(&self, signal: &HeartbeatSignal) -> bool {
        !self.stopped && self.timer.is_some() && signal.generation == self.generation
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat() -> (Heartbeat, mpsc::UnboundedReceiver<HeartbeatSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hb = Heartbeat::new(Duration::from_secs(60), Duration::from_secs(10), tx);
        (hb, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_then_lost() {
        let (mut hb, mut rx) = heartbeat();
        hb.reset();

        let ping = rx.recv().await.unwrap();
        assert_eq!(ping.beat, Beat::Ping);
        assert!(hb.is_current(&ping));

        let lost = rx.recv().await.unwrap();
        assert_eq!(lost.beat, Beat::Lost);
        assert!(hb.is_current(&lost));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_postpones_and_invalidates() {
        let (mut hb, mut rx) = heartbeat();
        hb.reset();
        tokio::time::sleep(Duration::from_secs(59)).await;
        hb.reset();
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(rx.try_recv().is_err());

        let ping = rx.recv().await.unwrap();
        assert_eq!(ping.beat, Beat::Ping);

        let stale = HeartbeatSignal {
            generation: 0,
            beat: Beat::Lost,
        };
        assert!(!hb.is_current(&stale));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_permanent() {
        let (mut hb, mut rx) = heartbeat();
        hb.reset();
        hb.stop();
        hb.reset();
        assert!(hb.is_stopped());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }
}
