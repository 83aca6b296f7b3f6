//! Byte-budget semaphore bounding the sum of in-flight file sizes during a run.
//!
//! Admission is FIFO: a large file parked at the head of the wait queue is
//! guaranteed to be the next one woken, even if smaller requests arrive and
//! would otherwise fit — a naive notify-any condvar can starve it indefinitely
//! behind a trickle of small files. Neither outcome is reachable with
//! `tokio::sync::Semaphore` (no weighted admission under a dynamic byte cap),
//! so the wait queue is hand-rolled on a `parking_lot::Mutex`.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

struct Inner {
    budget: Option<u64>,
    in_flight: u64,
    waiters: VecDeque<(u64, oneshot::Sender<()>)>,
}

#[derive(Clone)]
pub struct ByteBudget {
    inner: Arc<Mutex<Inner>>,
}

impl ByteBudget {
    pub fn new(budget: Option<u64>) -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { budget, in_flight: 0, waiters: VecDeque::new() })) }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Admits `size` bytes, parking on the FIFO wait queue if admitting it
    /// now would exceed the budget. A disabled budget or a zero-size request
    /// never blocks.
    pub async fn acquire(&self, size: u64) -> Permit {
        let rx = {
            let mut guard = self.inner.lock();
            let budget = match guard.budget {
                Some(b) => b,
                None => return Permit { inner: self.inner.clone(), size: 0 },
            };
            if size == 0 {
                return Permit { inner: self.inner.clone(), size: 0 };
            }
            if guard.waiters.is_empty() && guard.in_flight + size <= budget {
                guard.in_flight += size;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                guard.waiters.push_back((size, tx));
                Some(rx)
            }
        };

        if let Some(rx) = rx {
            let _ = rx.await;
        }

        Permit { inner: self.inner.clone(), size }
    }

    pub fn in_flight(&self) -> u64 {
        self.inner.lock().in_flight
    }
}

/// Releases its share of the budget on drop, waking the next eligible waiter.
pub struct Permit {
    inner: Arc<Mutex<Inner>>,
    size: u64,
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.size == 0 {
            return;
        }
        let mut guard = self.inner.lock();
        guard.in_flight = guard.in_flight.saturating_sub(self.size);
        wake_eligible(&mut guard);
    }
}

fn wake_eligible(guard: &mut Inner) {
    let Some(budget) = guard.budget else { return };
    while let Some((size, _)) = guard.waiters.front() {
        if guard.in_flight + size > budget {
            break;
        }
        let (size, tx) = guard.waiters.pop_front().expect("front() just confirmed Some");
        guard.in_flight += size;
        let _ = tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn disabled_budget_never_blocks() {
        let budget = ByteBudget::unbounded();
        let _a = budget.acquire(1_000_000).await;
        let _b = budget.acquire(1_000_000).await;
    }

    #[tokio::test]
    async fn zero_size_request_is_a_no_op() {
        let budget = ByteBudget::new(Some(10));
        let permit = budget.acquire(0).await;
        assert_eq!(budget.in_flight(), 0);
        drop(permit);
    }

    #[tokio::test]
    async fn admits_up_to_budget_then_blocks() {
        let budget = ByteBudget::new(Some(10));
        let a = budget.acquire(6).await;
        assert_eq!(budget.in_flight(), 6);

        let budget2 = budget.clone();
        let waiting = tokio::spawn(async move {
            let _permit = budget2.acquire(6).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(a);
        tokio::time::timeout(Duration::from_secs(1), waiting).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn fifo_order_prevents_starvation_of_a_large_request() {
        let budget = ByteBudget::new(Some(10));
        let hold = budget.acquire(10).await;

        let budget_big = budget.clone();
        let big_done = Arc::new(Mutex::new(false));
        let big_done2 = big_done.clone();
        let big = tokio::spawn(async move {
            let _permit = budget_big.acquire(10).await;
            *big_done2.lock() = true;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let budget_small = budget.clone();
        let small = tokio::spawn(async move {
            let _permit = budget_small.acquire(1).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        // The small request must not jump ahead of the queued large one.
        assert!(!*big_done.lock());
        assert!(!small.is_finished());

        drop(hold);
        tokio::time::timeout(Duration::from_secs(1), big).await.unwrap().unwrap();
        tokio::time::timeout(Duration::from_secs(1), small).await.unwrap().unwrap();
    }
}
