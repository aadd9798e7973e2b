//! Fixed-capacity prioritized replay buffer.
//!
//! A ring buffer of training examples with per-slot priorities. Sampling is
//! proportional to `priority^alpha` and returns importance weights
//! `(len * p)^-beta`, normalized by the largest weight in the batch. Pushes
//! enter at the current maximum priority so fresh examples are drawn
//! quickly. All methods take `&self`; a single internal lock makes the
//! buffer safe for the multi-producer worker pool.

use parking_lot::Mutex;
use rand::Rng;

/// One `(query, values)` pair as produced at a subgame root.
#[derive(Debug, Clone)]
pub struct TrainingExample {
    pub query: Vec<f32>,
    pub values: Vec<f32>,
}

pub struct PrioritizedReplay<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
    /// Priority exponent.
    alpha: f64,
    /// Importance-weight exponent.
    beta: f64,
}

struct Inner<T> {
    items: Vec<T>,
    priorities: Vec<f64>,
    next_slot: usize,
    num_added: u64,
    max_priority: f64,
}

impl<T: Clone> PrioritizedReplay<T> {
    /// # Panics
    ///
    /// Panics on zero capacity.
    #[must_use]
    pub fn new(capacity: usize, alpha: f64, beta: f64) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            inner: Mutex::new(Inner {
                items: Vec::new(),
                priorities: Vec::new(),
                next_slot: 0,
                num_added: 0,
                max_priority: 1.0,
            }),
            capacity,
            alpha,
            beta,
        }
    }

    /// Append at the current maximum priority, overwriting the oldest slot
    /// once full.
    pub fn push(&self, item: T) {
        let mut inner = self.inner.lock();
        let priority = inner.max_priority;
        self.push_slot(&mut inner, item, priority);
    }

    /// Append with an explicit priority.
    pub fn push_with_priority(&self, item: T, priority: f64) {
        let mut inner = self.inner.lock();
        inner.max_priority = inner.max_priority.max(priority);
        self.push_slot(&mut inner, item, priority);
    }

    fn push_slot(&self, inner: &mut Inner<T>, item: T, priority: f64) {
        if inner.items.len() < self.capacity {
            inner.items.push(item);
            inner.priorities.push(priority);
        } else {
            let slot = inner.next_slot;
            inner.items[slot] = item;
            inner.priorities[slot] = priority;
        }
        inner.next_slot = (inner.next_slot + 1) % self.capacity;
        inner.num_added += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Total number of examples ever pushed, including overwritten ones.
    #[must_use]
    pub fn num_added(&self) -> u64 {
        self.inner.lock().num_added
    }

    /// Draw `batch_size` samples proportional to `priority^alpha`.
    ///
    /// Returns `(slot, importance_weight, item)` triples; the weights are
    /// normalized so the largest in the batch is 1. Empty buffer returns an
    /// empty batch.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(&self, batch_size: usize, rng: &mut impl Rng) -> Vec<(usize, f64, T)> {
        let inner = self.inner.lock();
        if inner.items.is_empty() {
            return Vec::new();
        }

        let scaled: Vec<f64> = inner
            .priorities
            .iter()
            .map(|&p| p.max(f64::MIN_POSITIVE).powf(self.alpha))
            .collect();
        let total: f64 = scaled.iter().sum();
        let len = inner.items.len() as f64;

        let mut batch: Vec<(usize, f64, T)> = (0..batch_size)
            .map(|_| {
                let mut remaining = rng.random::<f64>() * total;
                let mut slot = scaled.len() - 1;
                for (index, &mass) in scaled.iter().enumerate() {
                    remaining -= mass;
                    if remaining <= 0.0 {
                        slot = index;
                        break;
                    }
                }
                let probability = scaled[slot] / total;
                let weight = (len * probability).powf(-self.beta);
                (slot, weight, inner.items[slot].clone())
            })
            .collect();

        let max_weight = batch
            .iter()
            .map(|&(_, w, _)| w)
            .fold(f64::MIN_POSITIVE, f64::max);
        for entry in &mut batch {
            entry.1 /= max_weight;
        }
        batch
    }

    /// Update priorities after a training pass, keyed by slot index.
    pub fn update_priorities(&self, updates: &[(usize, f64)]) {
        let mut inner = self.inner.lock();
        for &(slot, priority) in updates {
            if slot < inner.priorities.len() {
                inner.priorities[slot] = priority;
                inner.max_priority = inner.max_priority.max(priority);
            }
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
