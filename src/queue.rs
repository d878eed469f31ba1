//! Priority send queues with rolling-window rate limits.
//!
//! Each [`SendQueue`] owns a worker task. Queued tasks run one at a time,
//! highest priority first and FIFO within a priority, and no more than
//! `max` of them start within any rolling `window`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::future::Future;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::{QueueLimits, RateLimit};
use crate::error::{ChatError, Result};

/// A deferred send effect.
pub type QueueTask = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct QueueItem {
    priority: i32,
    seq: u64,
    task: QueueTask,
    done: oneshot::Sender<()>,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    // max-heap: higher priority first, then lower sequence number
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Rolling record of recent task start times.
#[derive(Debug)]
struct Window {
    limit: RateLimit,
    starts: VecDeque<Instant>,
}

impl Window {
    fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            starts: VecDeque::with_capacity(limit.max),
        }
    }

    /// When the next task may start; `None` means now.
    fn next_slot(&mut self, now: Instant) -> Option<Instant> {
        if self.limit.max == 0 {
            return None;
        }
        while let Some(start) = self.starts.front() {
            if now.duration_since(*start) >= self.limit.window {
                self.starts.pop_front();
            } else {
                break;
            }
        }
        if self.starts.len() < self.limit.max {
            None
        } else {
            self.starts.front().map(|start| *start + self.limit.window)
        }
    }

    fn record(&mut self, now: Instant) {
        if self.limit.max > 0 {
            self.starts.push_back(now);
        }
    }
}

struct Sender {
    tx: mpsc::UnboundedSender<QueueItem>,
    next_seq: u64,
}

/// One rate-limited queue.
pub struct SendQueue {
    name: &'static str,
    limit: RateLimit,
    sender: Mutex<Option<Sender>>,
    cancel: CancellationToken,
}

impl fmt::Debug for SendQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendQueue")
            .field("name", &self.name)
            .field("limit", &self.limit)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl SendQueue {
    /// Spawn the worker. Must be called inside a Tokio runtime.
    pub fn new(name: &'static str, limit: RateLimit) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(run(name, Window::new(limit), rx, cancel.clone()));
        Self {
            name,
            limit,
            sender: Mutex::new(Some(Sender { tx, next_seq: 0 })),
            cancel,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Queue `task`. The returned future resolves once the task has run,
    /// or with [`ChatError::Disconnected`] if the queue shut down first.
    pub fn push(&self, task: QueueTask, priority: i32) -> impl Future<Output = Result<()>> + Send + 'static {
        let (done, finished) = oneshot::channel();
        let queued = match self.sender.lock().as_mut() {
            Some(sender) => {
                let seq = sender.next_seq;
                sender.next_seq += 1;
                sender
                    .tx
                    .send(QueueItem {
                        priority,
                        seq,
                        task,
                        done,
                    })
                    .is_ok()
            }
            None => false,
        };
        async move {
            if !queued {
                return Err(ChatError::Disconnected);
            }
            finished.await.map_err(|_| ChatError::Disconnected)
        }
    }

    /// Stop the worker and drop everything still pending. Idempotent.
    pub fn shutdown(&self) {
        if self.sender.lock().take().is_some() {
            debug!(queue = self.name, "queue shut down");
        }
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SendQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    name: &'static str,
    mut window: Window,
    mut rx: mpsc::UnboundedReceiver<QueueItem>,
    cancel: CancellationToken,
) {
    let mut pending = BinaryHeap::new();
    loop {
        if pending.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => pending.push(item),
                    None => break,
                },
            }
        }
        while let Ok(item) = rx.try_recv() {
            pending.push(item);
        }

        let now = Instant::now();
        if let Some(slot) = window.next_slot(now) {
            trace!(queue = name, pending = pending.len(), "rate limited");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep_until(slot) => {}
                item = rx.recv() => match item {
                    Some(item) => pending.push(item),
                    None => break,
                },
            }
            continue;
        }

        let Some(item) = pending.pop() else {
            continue;
        };
        window.record(now);
        (item.task)().await;
        let _ = item.done.send(());
    }
    if !pending.is_empty() {
        debug!(queue = name, dropped = pending.len(), "abandoning queued sends");
    }
}

/// Which queue a line is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Auth,
    Join,
    Moderator,
    General,
}

impl QueueKind {
    /// `JOIN` lines go to the join queue, `PASS` to the auth queue,
    /// moderator sends to the moderator queue, the rest to general.
    pub fn route(line: &str, is_moderator: bool) -> Self {
        let verb = line.split_ascii_whitespace().next().unwrap_or("");
        if verb.eq_ignore_ascii_case("JOIN") {
            Self::Join
        } else if verb.eq_ignore_ascii_case("PASS") {
            Self::Auth
        } else if is_moderator {
            Self::Moderator
        } else {
            Self::General
        }
    }
}

/// The four queues of a connection.
#[derive(Debug)]
pub struct QueueSet {
    auth: SendQueue,
    join: SendQueue,
    moderator: SendQueue,
    general: SendQueue,
}

impl QueueSet {
    /// Must be called inside a Tokio runtime.
    pub fn new(limits: QueueLimits) -> Self {
        Self {
            auth: SendQueue::new("auth", limits.auth),
            join: SendQueue::new("join", limits.join),
            moderator: SendQueue::new("moderator", limits.moderator),
            general: SendQueue::new("general", limits.general),
        }
    }

    pub fn get(&self, kind: QueueKind) -> &SendQueue {
        match kind {
            QueueKind::Auth => &self.auth,
            QueueKind::Join => &self.join,
            QueueKind::Moderator => &self.moderator,
            QueueKind::General => &self.general,
        }
    }

    /// Route `line` and queue `task` on the chosen queue.
    pub fn push(
        &self,
        line: &str,
        is_moderator: bool,
        task: QueueTask,
        priority: i32,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let kind = QueueKind::route(line, is_moderator);
        self.get(kind).push(task, priority)
    }

    /// Shut down all four queues. Idempotent.
    pub fn shutdown(&self) {
        for queue in [&self.auth, &self.join, &self.moderator, &self.general] {
            queue.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(log: &Arc<Mutex<Vec<String>>>, label: &str) -> QueueTask {
        let log = Arc::clone(log);
        let label = label.to_string();
        Box::new(move || {
            Box::pin(async move {
                log.lock().push(label);
            })
        })
    }

    #[test]
    fn test_route() {
        assert_eq!(QueueKind::route("JOIN #a", false), QueueKind::Join);
        assert_eq!(QueueKind::route("PASS oauth:x", true), QueueKind::Auth);
        assert_eq!(QueueKind::route("PRIVMSG #a :/ban x", true), QueueKind::Moderator);
        assert_eq!(QueueKind::route("PRIVMSG #a :JOIN", false), QueueKind::General);
        assert_eq!(QueueKind::route("JOINED", false), QueueKind::General);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_then_fifo() {
        let log = recorder();
        let queue = SendQueue::new("test", RateLimit::new(1, Duration::from_secs(1)));

        // occupies the only slot so the rest pile up behind it
        let first = queue.push(record(&log, "first"), 0);
        first.await.unwrap();

        let low_a = queue.push(record(&log, "low-a"), 0);
        let low_b = queue.push(record(&log, "low-b"), 0);
        let high = queue.push(record(&log, "high"), 5);
        let (a, b, h) = tokio::join!(low_a, low_b, high);
        assert!(a.is_ok() && b.is_ok() && h.is_ok());

        assert_eq!(*log.lock(), vec!["first", "high", "low-a", "low-b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rolling_window() {
        let log = recorder();
        let queue = Arc::new(SendQueue::new("join", RateLimit::new(3, Duration::from_secs(10))));
        for i in 0..5 {
            let fut = queue.push(record(&log, &i.to_string()), 0);
            tokio::spawn(fut);
        }

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(log.lock().len(), 3);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(log.lock().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_pending() {
        let log = recorder();
        let queue = SendQueue::new("general", RateLimit::new(1, Duration::from_secs(30)));
        queue.push(record(&log, "sent"), 0).await.unwrap();

        let pending = queue.push(record(&log, "dropped"), 0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        queue.shutdown();
        queue.shutdown();

        assert!(matches!(pending.await, Err(ChatError::Disconnected)));
        assert!(matches!(
            queue.push(record(&log, "late"), 0).await,
            Err(ChatError::Disconnected)
        ));
        assert_eq!(*log.lock(), vec!["sent"]);
        assert!(queue.is_shut_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_routes_to_separate_limits() {
        let log = recorder();
        let set = QueueSet::new(QueueLimits::for_tier(crate::config::AccountTier::Standard));
        assert_eq!(set.get(QueueKind::Join).limit().max, 20);
        assert_eq!(set.get(QueueKind::Moderator).limit().max, 100);

        set.push("JOIN #a", false, record(&log, "join"), 0).await.unwrap();
        set.push("PRIVMSG #a :hi", false, record(&log, "say"), 0).await.unwrap();
        set.shutdown();
        assert_eq!(*log.lock(), vec!["join", "say"]);
    }
}
