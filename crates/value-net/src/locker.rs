//! Replica pool for device-pinned evaluators.
//!
//! Workers share a small number of network replicas per device; `acquire`
//! blocks until one is free and the guard returns it on drop. No worker
//! holds more than one replica at a time, so the pool cannot deadlock.

use std::ops::Deref;

use parking_lot::{Condvar, Mutex};

use crate::network::CounterfactualValueNet;

pub struct ModelLocker {
    free: Mutex<Vec<CounterfactualValueNet>>,
    available: Condvar,
}

impl ModelLocker {
    /// # Panics
    ///
    /// Panics on an empty replica list.
    #[must_use]
    pub fn new(replicas: Vec<CounterfactualValueNet>) -> Self {
        assert!(!replicas.is_empty(), "need at least one replica");
        Self {
            free: Mutex::new(replicas),
            available: Condvar::new(),
        }
    }

    /// Take a free replica, blocking until one is returned.
    pub fn acquire(&self) -> ModelGuard<'_> {
        let mut free = self.free.lock();
        loop {
            if let Some(net) = free.pop() {
                return ModelGuard {
                    locker: self,
                    net: Some(net),
                };
            }
            self.available.wait(&mut free);
        }
    }
}

/// Exclusive access to one replica; returned to the pool on drop.
pub struct ModelGuard<'a> {
    locker: &'a ModelLocker,
    net: Option<CounterfactualValueNet>,
}

impl Deref for ModelGuard<'_> {
    type Target = CounterfactualValueNet;

    fn deref(&self) -> &Self::Target {
        self.net.as_ref().expect("replica present until drop")
    }
}

impl Drop for ModelGuard<'_> {
    fn drop(&mut self) {
        if let Some(net) = self.net.take() {
            self.locker.free.lock().push(net);
            self.locker.available.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_macros::timed_test;

    fn make_replicas(count: usize) -> Vec<CounterfactualValueNet> {
        (0..count)
            .map(|_| {
                let varmap = VarMap::new();
                let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
                CounterfactualValueNet::new(4, 2, 8, &vs).unwrap()
            })
            .collect()
    }

    #[timed_test(30)]
    fn acquire_returns_replica_to_pool() {
        let locker = ModelLocker::new(make_replicas(1));
        {
            let replica = locker.acquire();
            assert_eq!(replica.num_hands(), 2);
        }
        // Released on drop: a second acquire must not block.
        let replica = locker.acquire();
        assert_eq!(replica.query_size(), 4);
    }

    #[timed_test(60)]
    fn concurrent_holders_never_exceed_pool_size() {
        let locker = Arc::new(ModelLocker::new(make_replicas(2)));
        let holders = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let locker = locker.clone();
                let holders = holders.clone();
                let peak = peak.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let _replica = locker.acquire();
                        let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        holders.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
