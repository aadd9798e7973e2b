//! Worker pool driving the recursive self-play runners.
//!
//! Each worker owns one seeded [`SelfPlayRunner`] and loops on it until the
//! shared terminate flag is raised. The only shared collaborator is the
//! value net handed in by the caller; solver state stays worker-local.
//! Pause/resume and termination are checked cooperatively between driver
//! steps, so an in-flight evaluator call is never interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use toss_solver_core::net::ValueNet;
use toss_solver_core::recursive::{RecursiveSolvingParams, SelfPlayRunner};

struct Shared {
    terminate: AtomicBool,
    paused: Mutex<bool>,
    resume: Condvar,
}

pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `num_workers` threads, seeded `0..num_workers`.
    #[must_use]
    pub fn spawn(
        num_workers: usize,
        params: RecursiveSolvingParams,
        value_net: Arc<dyn ValueNet>,
    ) -> Self {
        let shared = Arc::new(Shared {
            terminate: AtomicBool::new(false),
            paused: Mutex::new(false),
            resume: Condvar::new(),
        });

        let handles = (0..num_workers)
            .map(|seed| {
                let shared = shared.clone();
                let net = value_net.clone();
                std::thread::spawn(move || worker_loop(&shared, params, net, seed as u64))
            })
            .collect();
        Self { shared, handles }
    }

    pub fn pause(&self) {
        *self.shared.paused.lock() = true;
    }

    pub fn resume(&self) {
        *self.shared.paused.lock() = false;
        self.shared.resume.notify_all();
    }

    /// Raise the terminate flag; workers exit after their current step.
    pub fn terminate(&self) {
        self.shared.terminate.store(true, Ordering::SeqCst);
        self.resume();
    }

    /// Wait for every worker to exit.
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    shared: &Shared,
    params: RecursiveSolvingParams,
    value_net: Arc<dyn ValueNet>,
    seed: u64,
) {
    let mut runner = SelfPlayRunner::new(params, value_net, seed);
    while !shared.terminate.load(Ordering::SeqCst) {
        {
            let mut paused = shared.paused.lock();
            while *paused && !shared.terminate.load(Ordering::SeqCst) {
                shared.resume.wait(&mut paused);
            }
        }
        if shared.terminate.load(Ordering::SeqCst) {
            break;
        }
        if let Err(err) = runner.step() {
            eprintln!("worker {seed} stopping: {err}");
            break;
        }
    }
}
