use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::timeout;

use crate::error::{Error, Result};

/// Keyed single-flight queue: at most one mutation is in flight per key,
/// and later acquisitions queue strictly behind earlier ones. Distinct keys
/// never contend. Waiting is bounded both in time (`wait_budget`) and in
/// queue depth (`max_waiters`); either bound failing surfaces a timeout and
/// leaves state untouched, so callers retry.
pub struct KeyedMutex {
    slots: Mutex<HashMap<String, KeySlot>>,
    wait_budget: Duration,
    max_waiters: usize,
}

struct KeySlot {
    lock: Arc<AsyncMutex<()>>,
    waiters: usize,
}

impl KeyedMutex {
    pub fn new(wait_budget: Duration, max_waiters: usize) -> Self {
        KeyedMutex {
            slots: Mutex::new(HashMap::new()),
            wait_budget,
            max_waiters: max_waiters.max(1),
        }
    }

    pub async fn acquire(&self, key: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            let slot = slots.entry(key.to_string()).or_insert_with(|| KeySlot {
                lock: Arc::new(AsyncMutex::new(())),
                waiters: 0,
            });
            if slot.waiters >= self.max_waiters {
                return Err(Error::Timeout(format!(
                    "Mutation queue for {key} is full; retry shortly."
                )));
            }
            slot.waiters += 1;
            Arc::clone(&slot.lock)
        };

        let acquired = timeout(self.wait_budget, lock.lock_owned()).await;

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get_mut(key) {
            slot.waiters = slot.waiters.saturating_sub(1);
            // The map's Arc is the only one left exactly when nobody holds
            // or awaits the lock, which makes removal race-free.
            if slot.waiters == 0 && Arc::strong_count(&slot.lock) == 1 && acquired.is_err() {
                slots.remove(key);
            }
        }
        drop(slots);

        acquired.map_err(|_| {
            Error::Timeout(format!(
                "Mutation for {key} timed out waiting for an earlier update to apply."
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedMutex::new(Duration::from_millis(500), 8));
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = locks.acquire("comp/1/701").await.unwrap();
        let locks_clone = Arc::clone(&locks);
        let order_clone = Arc::clone(&order);
        let waiter = tokio::spawn(async move {
            let _guard = locks_clone.acquire("comp/1/701").await.unwrap();
            order_clone.lock().unwrap().push("second");
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        order.lock().unwrap().push("first");
        drop(first);
        waiter.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_in_parallel() {
        let locks = KeyedMutex::new(Duration::from_millis(100), 8);
        let _a = locks.acquire("comp/1/701").await.unwrap();
        // A different key must not queue behind the held one.
        let _b = locks.acquire("comp/2/701").await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_budget_expiry_times_out() {
        let locks = Arc::new(KeyedMutex::new(Duration::from_millis(50), 8));
        let _held = locks.acquire("comp/1/701").await.unwrap();

        let err = locks.acquire("comp/1/701").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_full_queue_rejects_immediately() {
        let locks = Arc::new(KeyedMutex::new(Duration::from_millis(200), 1));
        let _held = locks.acquire("comp/1/701").await.unwrap();

        let locks_clone = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _ = locks_clone.acquire("comp/1/701").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // One waiter is queued already; the next one exceeds the bound.
        let err = locks.acquire("comp/1/701").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        waiter.abort();
    }
}
