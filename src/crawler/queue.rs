use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

/// FIFO frontier queue with race-free idle detection
///
/// The queue tracks outstanding work: `push` increments a counter and
/// `task_done` decrements it once a dequeued item's processing - including
/// any child enqueues - has finished. When the counter reaches zero the
/// queue closes itself and wakes every waiting worker, so termination never
/// depends on timing out an empty queue while another worker is still about
/// to refill it.
pub struct FrontierQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

struct QueueInner {
    items: VecDeque<(String, u32)>,
    outstanding: usize,
    closed: bool,
}

impl FrontierQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                outstanding: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueues `(url, depth)`; returns false when the queue is closed
    pub fn push(&self, url: String, depth: u32) -> bool {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return false;
            }
            inner.items.push_back((url, depth));
            inner.outstanding += 1;
        }
        self.notify.notify_one();
        true
    }

    /// Dequeues the next item, waiting until one arrives or the queue closes
    ///
    /// Returns None only when the queue is closed and drained; workers treat
    /// that as the termination signal.
    pub async fn pop(&self) -> Option<(String, u32)> {
        loop {
            // Register for notification before checking, so a push between
            // the check and the await cannot be lost
            let notified = self.notify.notified();

            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(item) = inner.items.pop_front() {
                    drop(inner);
                    // Wake another waiter in case more items remain
                    self.notify.notify_one();
                    return Some(item);
                }
                if inner.closed {
                    drop(inner);
                    self.notify.notify_one();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Signals that a previously popped item has been fully processed
    ///
    /// Must be called exactly once per successful `pop`, on every exit path.
    /// Closing happens here: when the last outstanding item completes with
    /// an empty queue, there is provably no producer left.
    pub fn task_done(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.outstanding = inner.outstanding.saturating_sub(1);
        if inner.outstanding == 0 && inner.items.is_empty() && !inner.closed {
            inner.closed = true;
            drop(inner);
            self.notify.notify_waiters();
        }
    }

    /// Force-closes the queue (pause, max-pages); waiting workers wake with
    /// None and queued items are dropped from dequeue
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.closed = true;
        }
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().items.is_empty()
    }
}

impl Default for FrontierQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_push_pop_fifo() {
        let queue = FrontierQueue::new();
        assert!(queue.push("a".to_string(), 0));
        assert!(queue.push("b".to_string(), 1));

        assert_eq!(queue.pop().await, Some(("a".to_string(), 0)));
        assert_eq!(queue.pop().await, Some(("b".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_closes_when_work_drains() {
        let queue = Arc::new(FrontierQueue::new());
        queue.push("a".to_string(), 0);

        let popped = queue.pop().await.unwrap();
        assert_eq!(popped.0, "a");

        // Last outstanding item finishing closes the queue
        queue.task_done();
        assert!(queue.is_closed());
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_stays_open_while_item_in_flight() {
        let queue = Arc::new(FrontierQueue::new());
        queue.push("a".to_string(), 0);
        let _item = queue.pop().await.unwrap();

        // Queue is empty but the item is still being processed: a waiting
        // worker must not see termination yet
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        // The in-flight item spawns a child before finishing
        queue.push("child".to_string(), 1);
        queue.task_done();

        let got = waiter.await.unwrap();
        assert_eq!(got, Some(("child".to_string(), 1)));

        queue.task_done();
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_close_wakes_all_waiters() {
        let queue = Arc::new(FrontierQueue::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.pop().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_push_after_close_rejected() {
        let queue = FrontierQueue::new();
        queue.close();
        assert!(!queue.push("a".to_string(), 0));
        assert_eq!(queue.pop().await, None);
    }
}
