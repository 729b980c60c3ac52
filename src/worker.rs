//! The extractor pool.
//!
//! Homogeneous long-lived worker threads: pop a fragment, parse it, walk
//! the action registry, repeat. The last worker out after the queue drains
//! advances the lifecycle; any failure flips the pipeline into its error
//! state and stops this worker on the spot; the survivors are reaped by
//! the lifecycle's termination sequence.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::actions::ActionRegistry;
use crate::error::Result;
use crate::executor::InOrderExecutor;
use crate::lifecycle::Lifecycle;
use crate::queue::{JobQueue, PopStatus};
use crate::splitter::Fragment;
use crate::xml;

pub fn spawn_workers(
    count: usize,
    queue: Arc<JobQueue>,
    registry: Arc<ActionRegistry>,
    executor: Arc<InOrderExecutor>,
    lifecycle: Arc<Lifecycle>,
) -> Vec<JoinHandle<()>> {
    let alive = Arc::new(AtomicUsize::new(count));
    (0..count)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let registry = Arc::clone(&registry);
            let executor = Arc::clone(&executor);
            let lifecycle = Arc::clone(&lifecycle);
            let alive = Arc::clone(&alive);
            thread::spawn(move || worker_loop(&queue, &registry, &executor, &lifecycle, &alive))
        })
        .collect()
}

fn worker_loop(
    queue: &JobQueue,
    registry: &ActionRegistry,
    executor: &InOrderExecutor,
    lifecycle: &Lifecycle,
    alive: &AtomicUsize,
) {
    loop {
        match queue.pop() {
            PopStatus::Job(job) => {
                if let Err(err) = process_job(registry, executor, job) {
                    lifecycle.fail(err);
                    return;
                }
            }
            PopStatus::Drained => {
                // The worker that drives the counter to zero reports the
                // whole pool as finished.
                if alive.fetch_sub(1, Ordering::SeqCst) == 1 {
                    if let Err(bug) = lifecycle.extractors_finished() {
                        lifecycle.fail(bug);
                    }
                }
                return;
            }
            PopStatus::Terminated => return,
        }
    }
}

fn process_job(registry: &ActionRegistry, executor: &InOrderExecutor, job: Fragment) -> Result<()> {
    let file = job.file_name.clone();
    let (start, end) = (job.start_line, job.end_line);
    let tree = xml::parse_document(&job.text).map_err(|e| e.at_source(&file, start, end))?;
    registry
        .dispatch(tree, job, executor)
        .map_err(|e| e.at_source(&file, start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, SieveConfig};
    use crate::queue::PushStatus;
    use crate::state::SinkState;

    fn fragment(seq: u64, text: &str) -> Fragment {
        Fragment {
            seq,
            text: text.to_string(),
            file_name: "pool-test".to_string(),
            start_line: 1,
            end_line: 1,
        }
    }

    fn dedup_registry() -> Arc<ActionRegistry> {
        Arc::new(ActionRegistry::for_mode(&SieveConfig {
            workers: 4,
            mode: Mode::Dedup,
        }))
    }

    #[test]
    fn every_job_produces_exactly_one_task() {
        let queue = Arc::new(JobQueue::new(4));
        let executor = Arc::new(InOrderExecutor::new());
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.set_running();

        let packet = "<dm_log_packet>\
            <pair key=\"timestamp\">2019-03-01 08:00:00</pair>\
            <pair key=\"type_id\">T</pair>\
            </dm_log_packet>";
        for seq in 0..64 {
            assert!(matches!(
                queue.push(fragment(seq, packet)).unwrap(),
                PushStatus::Queued
            ));
        }
        queue.finish();
        // Workers may only advance the lifecycle past SplitterFinished.
        lifecycle.splitter_finished().unwrap();

        let handles = spawn_workers(
            4,
            Arc::clone(&queue),
            dedup_registry(),
            Arc::clone(&executor),
            Arc::clone(&lifecycle),
        );
        for handle in handles {
            handle.join().unwrap();
        }

        // Drained without a gap bug means tasks 0..64 all exist.
        executor.finish();
        let mut state = SinkState::new(Box::new(Vec::new()), None);
        assert!(executor.run(&mut state).is_ok());
    }

    #[test]
    fn malformed_xml_fails_the_lifecycle_with_coordinates() {
        let queue = Arc::new(JobQueue::new(1));
        let executor = Arc::new(InOrderExecutor::new());
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.set_running();

        queue.push(fragment(0, "<a><b></a>")).unwrap();
        queue.finish();

        let handles = spawn_workers(
            1,
            Arc::clone(&queue),
            dedup_registry(),
            Arc::clone(&executor),
            Arc::clone(&lifecycle),
        );
        for handle in handles {
            handle.join().unwrap();
        }

        let failure = lifecycle.take_failure().expect("a failure must be stored");
        assert_eq!(failure.kind_label(), "input");
        assert!(failure.to_string().contains("pool-test"));
        assert!(failure.to_string().contains("line 1-1"));
    }
}
