//! In-order executor.
//!
//! Workers finish in whatever order the scheduler gives them, so their side
//! effects arrive here as `(seq, task)` pairs and wait in a min-heap until
//! the contiguous sequence catches up. One thread drains the heap strictly
//! in ascending `seq`; since that thread is the only one ever touching the
//! `SinkState`, tasks get a plain `&mut` and no further synchronization.
//!
//! The producers guarantee contiguous sequence numbers. A hole discovered
//! after the producers are done can never fill, so it is reported as a bug.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, SieveError};
use crate::state::SinkState;

pub type Task = Box<dyn FnOnce(&mut SinkState) -> Result<()> + Send>;

struct OrderedTask {
    seq: u64,
    task: Task,
}

// Heap order: smallest `seq` on top.
impl PartialEq for OrderedTask {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}
impl Eq for OrderedTask {}
impl PartialOrd for OrderedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other.seq.cmp(&self.seq)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ExecutorExit {
    /// All producers finished and every task ran.
    Drained,
    /// Early termination was requested.
    Terminated,
}

struct ExecutorInner {
    pending: BinaryHeap<OrderedTask>,
    next_seq: u64,
    no_more_tasks: bool,
    terminating: bool,
}

pub struct InOrderExecutor {
    inner: Mutex<ExecutorInner>,
    runnable: Condvar,
}

impl Default for InOrderExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl InOrderExecutor {
    pub fn new() -> Self {
        InOrderExecutor {
            inner: Mutex::new(ExecutorInner {
                pending: BinaryHeap::new(),
                next_seq: 0,
                no_more_tasks: false,
                terminating: false,
            }),
            runnable: Condvar::new(),
        }
    }

    fn locked(&self) -> MutexGuard<'_, ExecutorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule a task. Never blocks; the executor is woken only when the
    /// task it is waiting for arrives.
    pub fn insert(&self, seq: u64, task: Task) {
        let mut inner = self.locked();
        if seq == inner.next_seq {
            self.runnable.notify_one();
        }
        inner.pending.push(OrderedTask { seq, task });
    }

    /// Signal that the producers have all exited.
    pub fn finish(&self) {
        let mut inner = self.locked();
        inner.no_more_tasks = true;
        self.runnable.notify_one();
        drop(inner);
    }

    /// Cooperative early termination.
    pub fn kill(&self) {
        let mut inner = self.locked();
        inner.terminating = true;
        self.runnable.notify_one();
        drop(inner);
    }

    /// The executor thread's loop. Returns once terminated or drained; a
    /// task error propagates to the caller.
    pub fn run(&self, state: &mut SinkState) -> Result<ExecutorExit> {
        let mut inner = self.locked();
        loop {
            while !(inner.terminating
                || inner.no_more_tasks
                || inner
                    .pending
                    .peek()
                    .is_some_and(|top| top.seq == inner.next_seq))
            {
                inner = self
                    .runnable
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }

            if inner.terminating {
                return Ok(ExecutorExit::Terminated);
            }

            if inner.no_more_tasks {
                match inner.pending.peek() {
                    None => return Ok(ExecutorExit::Drained),
                    Some(top) if top.seq != inner.next_seq => {
                        return Err(SieveError::bug(format!(
                            "the extractors have exited but task {} is still pending while \
                             task {} was expected; the remaining tasks can never run in order",
                            top.seq, inner.next_seq
                        )));
                    }
                    Some(_) => {}
                }
            }

            while inner
                .pending
                .peek()
                .is_some_and(|top| top.seq == inner.next_seq)
            {
                if let Some(ordered) = inner.pending.pop() {
                    (ordered.task)(state)?;
                    inner.next_seq += 1;
                }
            }
        }
    }
}
