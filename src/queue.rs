//! Bounded job queue between the splitter and the extractor pool.
//!
//! One mutex, two condition variables, three watermarks scaled by the worker
//! count. The producer blocks once HIGH pending jobs pile up; consumers only
//! wake it again when the backlog has drained to LOW, so the splitter runs
//! in long bursts instead of ping-ponging around the limit. MID marks the
//! expected operating band between the two.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, SieveError};
use crate::splitter::Fragment;

/// Per-worker watermark factors; the effective thresholds are these times
/// the worker count.
pub const HIGH_WATER_MARK: usize = 128;
pub const MID_WATER_MARK: usize = 32;
pub const LOW_WATER_MARK: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    pub high: usize,
    pub mid: usize,
    pub low: usize,
}

impl Watermarks {
    pub fn for_workers(workers: usize) -> Self {
        Watermarks {
            high: workers * HIGH_WATER_MARK,
            mid: workers * MID_WATER_MARK,
            low: workers * LOW_WATER_MARK,
        }
    }
}

#[derive(Debug)]
pub enum PushStatus {
    Queued,
    /// Early termination was requested; the job was dropped.
    Terminated,
}

pub enum PopStatus {
    Job(Fragment),
    /// The producer finished and the queue is empty; the worker should exit.
    Drained,
    /// Early termination was requested.
    Terminated,
}

struct QueueInner {
    jobs: VecDeque<Fragment>,
    producer_finished: bool,
    terminating: bool,
    idle_workers: usize,
}

pub struct JobQueue {
    inner: Mutex<QueueInner>,
    nonempty: Condvar,
    nonfull: Condvar,
    marks: Watermarks,
}

impl JobQueue {
    pub fn new(workers: usize) -> Self {
        JobQueue {
            inner: Mutex::new(QueueInner {
                jobs: VecDeque::new(),
                producer_finished: false,
                terminating: false,
                idle_workers: 0,
            }),
            nonempty: Condvar::new(),
            nonfull: Condvar::new(),
            marks: Watermarks::for_workers(workers),
        }
    }

    fn locked(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Producer side. Blocks while HIGH jobs are pending.
    pub fn push(&self, job: Fragment) -> Result<PushStatus> {
        let mut inner = self.locked();
        while !(inner.producer_finished
            || inner.terminating
            || inner.jobs.len() < self.marks.high)
        {
            inner = self
                .nonfull
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if inner.terminating {
            return Ok(PushStatus::Terminated);
        }
        if inner.producer_finished {
            return Err(SieveError::bug(
                "the splitter has been marked finished but is still producing jobs",
            ));
        }

        inner.jobs.push_back(job);
        if inner.idle_workers > 0 {
            self.nonempty.notify_one();
        }
        Ok(PushStatus::Queued)
    }

    /// Consumer side. Blocks while the queue is empty and the producer is
    /// still running.
    pub fn pop(&self) -> PopStatus {
        let mut inner = self.locked();

        if inner.jobs.is_empty() {
            inner.idle_workers += 1;
            while inner.jobs.is_empty() && !inner.producer_finished && !inner.terminating {
                inner = self
                    .nonempty
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            inner.idle_workers -= 1;
        }

        if inner.terminating {
            return PopStatus::Terminated;
        }
        if inner.jobs.is_empty() {
            // Woke because the producer finished with nothing left.
            return PopStatus::Drained;
        }

        match inner.jobs.pop_front() {
            Some(job) => {
                // Hysteresis: the blocked producer is only woken once the
                // backlog has come down to the low mark.
                if inner.jobs.len() <= self.marks.low {
                    self.nonfull.notify_one();
                }
                PopStatus::Job(job)
            }
            None => PopStatus::Drained,
        }
    }

    /// Mark the producer as finished and wake every waiting consumer so they
    /// can drain and exit.
    pub fn finish(&self) {
        let mut inner = self.locked();
        inner.producer_finished = true;
        self.nonempty.notify_all();
    }

    /// Cooperative early termination; wakes both sides.
    pub fn kill(&self) {
        let mut inner = self.locked();
        inner.terminating = true;
        self.nonempty.notify_all();
        self.nonfull.notify_all();
        drop(inner);
    }

    #[allow(dead_code)] // exercised by the watermark tests
    pub fn len(&self) -> usize {
        self.locked().jobs.len()
    }
}
