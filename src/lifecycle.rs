//! Pipeline lifecycle: the state machine the main thread runs.
//!
//! Normal execution walks
//! `Initializing → AllRunning → SplitterFinished → ExtractorFinished →
//! InOrderExecutorFinished`; each stage's completion notification moves the
//! machine one step, and the main thread reacts by joining the finished
//! stage and signalling the next one. Any stage that hits a failure flips
//! the state to `Error` (first failure wins); the main thread then
//! terminates the surviving stages in a fixed order (splitter, workers,
//! executor), joins them all, and surfaces the stored failure.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::actions::ActionRegistry;
use crate::config::{Mode, SieveConfig};
use crate::error::{Result, SieveError};
use crate::executor::{ExecutorExit, InOrderExecutor};
use crate::input::InputSource;
use crate::queue::{JobQueue, PushStatus};
use crate::sorter::ReorderWindow;
use crate::splitter::Splitter;
use crate::state::SinkState;
use crate::worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    AllRunning,
    SplitterFinished,
    ExtractorFinished,
    InOrderExecutorFinished,
    Error,
}

struct LifecycleInner {
    state: PipelineState,
    failure: Option<SieveError>,
}

pub struct Lifecycle {
    inner: Mutex<LifecycleInner>,
    changed: Condvar,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle {
            inner: Mutex::new(LifecycleInner {
                state: PipelineState::Initializing,
                failure: None,
            }),
            changed: Condvar::new(),
        }
    }

    fn locked(&self) -> MutexGuard<'_, LifecycleInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_running(&self) {
        let mut inner = self.locked();
        if inner.state == PipelineState::Initializing {
            inner.state = PipelineState::AllRunning;
            self.changed.notify_all();
        }
    }

    /// Record a stage failure. The first one wins; later ones are dropped
    /// (their stages still exit through the termination sequence).
    pub fn fail(&self, failure: SieveError) {
        let mut inner = self.locked();
        if inner.state != PipelineState::Error {
            inner.failure = Some(failure);
            inner.state = PipelineState::Error;
            self.changed.notify_all();
        }
    }

    pub fn splitter_finished(&self) -> Result<()> {
        self.advance(
            PipelineState::AllRunning,
            PipelineState::SplitterFinished,
            "the splitter finished, but the pipeline is neither in AllRunning nor Error",
        )
    }

    pub fn extractors_finished(&self) -> Result<()> {
        self.advance(
            PipelineState::SplitterFinished,
            PipelineState::ExtractorFinished,
            "the last extractor exited, but the pipeline is neither in SplitterFinished nor Error",
        )
    }

    pub fn executor_finished(&self) -> Result<()> {
        self.advance(
            PipelineState::ExtractorFinished,
            PipelineState::InOrderExecutorFinished,
            "the executor finished, but the pipeline is neither in ExtractorFinished nor Error",
        )
    }

    fn advance(&self, from: PipelineState, to: PipelineState, bug: &str) -> Result<()> {
        let mut inner = self.locked();
        if inner.state == from {
            inner.state = to;
            self.changed.notify_all();
            Ok(())
        } else if inner.state == PipelineState::Error {
            Ok(())
        } else {
            Err(SieveError::bug(bug))
        }
    }

    /// Block until the state moves away from `from`; returns the new state.
    pub fn wait_leaving(&self, from: PipelineState) -> PipelineState {
        let mut inner = self.locked();
        while inner.state == from {
            inner = self
                .changed
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        inner.state
    }

    pub fn current(&self) -> PipelineState {
        self.locked().state
    }

    pub fn take_failure(&self) -> Option<SieveError> {
        self.locked().failure.take()
    }
}

/// Run the whole pipeline to completion on the calling thread.
pub fn run(
    config: SieveConfig,
    sources: Vec<InputSource>,
    output: Box<dyn std::io::Write + Send>,
) -> Result<()> {
    let registry = Arc::new(ActionRegistry::for_mode(&config));
    let reorder = match &config.mode {
        Mode::Reorder(tolerance) => Some(ReorderWindow::new(*tolerance)?),
        _ => None,
    };
    let state = SinkState::new(output, reorder);

    let lifecycle = Arc::new(Lifecycle::new());
    let queue = Arc::new(JobQueue::new(config.workers));
    let executor = Arc::new(InOrderExecutor::new());
    let splitter_stop = Arc::new(AtomicBool::new(false));

    lifecycle.set_running();

    let mut splitter_handle = Some(spawn_splitter(
        sources,
        Arc::clone(&queue),
        Arc::clone(&lifecycle),
        Arc::clone(&splitter_stop),
    ));
    let mut worker_handles = worker::spawn_workers(
        config.workers,
        Arc::clone(&queue),
        registry,
        Arc::clone(&executor),
        Arc::clone(&lifecycle),
    );
    let mut executor_handle = Some(spawn_executor(
        state,
        Arc::clone(&executor),
        Arc::clone(&lifecycle),
    ));

    let mut state_now = lifecycle.current();
    loop {
        match state_now {
            PipelineState::Initializing | PipelineState::AllRunning => {
                state_now = lifecycle.wait_leaving(state_now);
            }
            PipelineState::SplitterFinished => {
                join_unit(&mut splitter_handle, &lifecycle, "splitter");
                queue.finish();
                state_now = lifecycle.wait_leaving(PipelineState::SplitterFinished);
            }
            PipelineState::ExtractorFinished => {
                join_workers(&mut worker_handles, &lifecycle);
                executor.finish();
                state_now = lifecycle.wait_leaving(PipelineState::ExtractorFinished);
            }
            PipelineState::InOrderExecutorFinished => {
                let mut state = join_executor(&mut executor_handle)?;
                state.flush_reorder()?;
                state.output.flush()?;
                return Ok(());
            }
            PipelineState::Error => {
                // Fixed termination order: splitter, workers, executor.
                splitter_stop.store(true, Ordering::SeqCst);
                queue.kill();
                executor.kill();
                join_unit(&mut splitter_handle, &lifecycle, "splitter");
                join_workers(&mut worker_handles, &lifecycle);
                let _ = join_executor(&mut executor_handle);
                return Err(lifecycle.take_failure().unwrap_or_else(|| {
                    SieveError::bug(
                        "the pipeline moved to the Error state but no failure was recorded",
                    )
                }));
            }
        }
    }
}

fn spawn_splitter(
    sources: Vec<InputSource>,
    queue: Arc<JobQueue>,
    lifecycle: Arc<Lifecycle>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut splitter = Splitter::new(sources);
        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            match splitter.next_fragment() {
                Ok(Some(fragment)) => match queue.push(fragment) {
                    Ok(PushStatus::Queued) => {}
                    Ok(PushStatus::Terminated) => return,
                    Err(err) => {
                        lifecycle.fail(err);
                        return;
                    }
                },
                Ok(None) => break,
                Err(err) => {
                    lifecycle.fail(err);
                    return;
                }
            }
        }
        if let Err(bug) = lifecycle.splitter_finished() {
            lifecycle.fail(bug);
        }
    })
}

fn spawn_executor(
    state: SinkState,
    executor: Arc<InOrderExecutor>,
    lifecycle: Arc<Lifecycle>,
) -> JoinHandle<SinkState> {
    std::thread::spawn(move || {
        let mut state = state;
        match executor.run(&mut state) {
            Ok(ExecutorExit::Drained) => {
                if let Err(bug) = lifecycle.executor_finished() {
                    lifecycle.fail(bug);
                }
            }
            Ok(ExecutorExit::Terminated) => {}
            Err(err) => lifecycle.fail(err),
        }
        state
    })
}

fn join_unit(handle: &mut Option<JoinHandle<()>>, lifecycle: &Lifecycle, stage: &str) {
    if let Some(handle) = handle.take() {
        if handle.join().is_err() {
            lifecycle.fail(SieveError::bug(format!("the {stage} thread panicked")));
        }
    }
}

fn join_workers(handles: &mut Vec<JoinHandle<()>>, lifecycle: &Lifecycle) {
    for handle in handles.drain(..) {
        if handle.join().is_err() {
            lifecycle.fail(SieveError::bug("an extractor thread panicked"));
        }
    }
}

fn join_executor(handle: &mut Option<JoinHandle<SinkState>>) -> Result<SinkState> {
    match handle.take() {
        Some(handle) => handle
            .join()
            .map_err(|_| SieveError::bug("the executor thread panicked")),
        None => Err(SieveError::bug("the executor thread was joined twice")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<StdMutex<Vec<u8>>>);

    impl std::io::Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn source(data: &str) -> Vec<InputSource> {
        vec![InputSource::new(
            "mem",
            Box::new(Cursor::new(data.as_bytes().to_vec())),
        )]
    }

    fn packet(ts: &str, type_id: &str) -> String {
        format!(
            "<dm_log_packet><pair key=\"timestamp\">{ts}</pair>\
             <pair key=\"type_id\">{type_id}</pair></dm_log_packet>"
        )
    }

    #[test]
    fn state_machine_walks_the_happy_path() {
        let lifecycle = Lifecycle::new();
        lifecycle.set_running();
        assert_eq!(lifecycle.current(), PipelineState::AllRunning);
        lifecycle.splitter_finished().unwrap();
        lifecycle.extractors_finished().unwrap();
        lifecycle.executor_finished().unwrap();
        assert_eq!(lifecycle.current(), PipelineState::InOrderExecutorFinished);
    }

    #[test]
    fn out_of_order_notifications_are_bugs() {
        let lifecycle = Lifecycle::new();
        lifecycle.set_running();
        assert!(lifecycle.extractors_finished().is_err());
        assert!(lifecycle.executor_finished().is_err());
    }

    #[test]
    fn notifications_after_an_error_are_silently_accepted() {
        let lifecycle = Lifecycle::new();
        lifecycle.set_running();
        lifecycle.fail(SieveError::input("first"));
        lifecycle.fail(SieveError::input("second"));
        assert!(lifecycle.splitter_finished().is_ok());
        assert!(lifecycle.extractors_finished().is_ok());
        let stored = lifecycle.take_failure().unwrap();
        assert_eq!(stored.to_string(), "first");
    }

    #[test]
    fn end_to_end_dedup_pipeline_in_process() {
        let sink = SharedSink::default();
        let bytes = Arc::clone(&sink.0);
        let input = [
            packet("2019-03-01 08:00:00.000100", "A"),
            packet("2019-03-01 08:00:00.000200", "B"),
            packet("2019-03-01 08:00:00.000150", "C"),
            packet("2019-03-01 08:00:00.000300", "D"),
        ]
        .join("\n");

        run(
            SieveConfig {
                workers: 4,
                mode: Mode::Dedup,
            },
            source(&input),
            Box::new(sink),
        )
        .unwrap();

        let out = String::from_utf8(bytes.lock().unwrap().clone()).unwrap();
        let emitted: Vec<&str> = out.lines().collect();
        assert_eq!(emitted.len(), 3);
        assert!(emitted[0].contains("\"type_id\">A<"));
        assert!(emitted[1].contains("\"type_id\">B<"));
        assert!(emitted[2].contains("\"type_id\">D<"));
    }

    #[test]
    fn malformed_packet_fails_the_run() {
        let err = run(
            SieveConfig {
                workers: 2,
                mode: Mode::Dedup,
            },
            source("<dm_log_packet><pair></dm_log_packet>"),
            Box::new(SharedSink::default()),
        )
        .unwrap_err();
        assert_eq!(err.kind_label(), "input");
    }
}
