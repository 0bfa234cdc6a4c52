//! Ready queue & CPU worker pool (§4.1).
//!
//! Mutex + `Condvar` ready queue, `Vec<JoinHandle<()>>` worker pool, and an
//! `AtomicBool` shutdown flag — the same shape as the `TaskQueue`/`Scheduler`
//! pair in `naml`'s M:N runtime scheduler
//! (`other_examples/3816099f_kahflane-naml__namlc-src-runtime-scheduler.rs`),
//! adapted from a work-stealing task pool to a FIFO ready queue that also
//! supports preemptive re-enqueue for round-robin.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::process::Process;

/// Selected scheduling discipline (§4.1, config key `scheduler`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Fcfs,
    RoundRobin,
}

/// How long a blocked worker waits before rechecking the queue/shutdown
/// flag. Each such recheck-while-empty counts as one idle tick (§4.1).
const IDLE_POLL: Duration = Duration::from_millis(20);

pub struct ReadyQueue {
    queue: Mutex<VecDeque<Arc<Mutex<Process>>>>,
    condvar: Condvar,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self { queue: Mutex::new(VecDeque::new()), condvar: Condvar::new() }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Admit a process to the tail; wakes one blocked consumer (§4.1
    /// "enqueue(p) admits a process to the tail; blocked consumers are
    /// woken").
    pub fn enqueue(&self, process: Arc<Mutex<Process>>) {
        let mut guard = self.queue.lock().unwrap();
        guard.push_back(process);
        self.condvar.notify_one();
    }

    /// Blocks until a process is available or `shutdown` is set with the
    /// queue empty. Ties to a shutdown flag it does not own so a single
    /// flag can gate every worker at once (§5 cancellation).
    pub fn dequeue_blocking(
        &self,
        shutdown: &std::sync::atomic::AtomicBool,
        idle_ticks: &AtomicU64,
    ) -> Option<Arc<Mutex<Process>>> {
        let mut guard = self.queue.lock().unwrap();
        loop {
            if let Some(p) = guard.pop_front() {
                return Some(p);
            }
            if shutdown.load(Ordering::SeqCst) {
                return None;
            }
            idle_ticks.fetch_add(1, Ordering::SeqCst);
            let (g, _timed_out) = self.condvar.wait_timeout(guard, IDLE_POLL).unwrap();
            guard = g;
        }
    }

    pub fn wake_all(&self) {
        self.condvar.notify_all();
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}
