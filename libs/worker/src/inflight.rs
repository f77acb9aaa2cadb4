//! Bounded in-flight job counter.
//!
//! Observability and backpressure within one process. QoS=1 per channel is
//! what actually throttles the broker; this counter exists so operators can
//! reason about concurrency and so dispatch can refuse work if a future
//! policy needs it. Incremented before a handler runs, decremented before
//! the feedback publish, never negative.

use crate::metrics;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tracing::warn;

pub struct InFlightCounter {
    capacity: usize,
    permits: Arc<Semaphore>,
    count: AtomicUsize,
}

impl InFlightCounter {
    /// Create a counter bounded at `capacity` concurrent jobs.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            count: AtomicUsize::new(0),
        }
    }

    /// Wait for room and mark one job as in flight.
    pub async fn acquire(&self) {
        // The semaphore is never closed while the counter is alive.
        let permit = self
            .permits
            .acquire()
            .await
            .expect("in-flight semaphore closed");
        permit.forget();
        let current = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_in_flight_jobs(current as f64);
    }

    /// Mark one job as done. Saturates at zero.
    pub fn release(&self) {
        let updated = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match updated {
            Ok(previous) => {
                self.permits.add_permits(1);
                metrics::set_in_flight_jobs((previous - 1) as f64);
            }
            Err(_) => {
                warn!("Attempted to release in-flight counter below zero");
            }
        }
    }

    /// Jobs currently in flight.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
