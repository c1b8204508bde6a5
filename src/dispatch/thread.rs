//! Background thread that drives a dispatch job on a fixed cadence.
//!
//! Production deployments usually trigger `DispatchJob::run_once` from their
//! own scheduler; this is the self-contained alternative for single-process
//! setups and tests.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::channel::Channel;
use crate::outbox::OutboxStore;
use crate::serialize::EventSerializer;

use super::job::{DispatchJob, RunOutcome};

/// Statistics from the dispatch worker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub polls: usize,
    pub runs_dispatched: usize,
    pub runs_failed: usize,
    pub events_sent: usize,
}

/// A background thread that calls `run_once` every `poll_interval`.
///
/// ## Example
///
/// ```ignore
/// let job = Arc::new(DispatchJob::new(store, serializer, channel, config)?);
/// let worker = DispatchWorkerThread::spawn(job, Duration::from_millis(50));
///
/// // ... capture events ...
///
/// let stats = worker.stop();
/// println!("Relayed {} events", stats.events_sent);
/// ```
pub struct DispatchWorkerThread {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<WorkerStats>>,
}

impl DispatchWorkerThread {
    pub fn spawn<S, Z, C>(job: Arc<DispatchJob<S, Z, C>>, poll_interval: Duration) -> Self
    where
        S: OutboxStore + 'static,
        Z: EventSerializer + 'static,
        C: Channel + 'static,
    {
        Self::spawn_with_name(job, poll_interval, "outbox-dispatch")
    }

    /// Spawn with a custom thread name.
    pub fn spawn_with_name<S, Z, C>(
        job: Arc<DispatchJob<S, Z, C>>,
        poll_interval: Duration,
        name: &str,
    ) -> Self
    where
        S: OutboxStore + 'static,
        Z: EventSerializer + 'static,
        C: Channel + 'static,
    {
        let (stop_tx, stop_rx) = channel();
        let name = name.to_string();

        let handle = thread::spawn(move || {
            let mut stats = WorkerStats::default();
            tracing::info!(
                worker = %name,
                interval = ?poll_interval,
                "dispatch worker started"
            );

            loop {
                stats.polls += 1;

                match job.run_once() {
                    RunOutcome::Dispatched(report) => {
                        stats.runs_dispatched += 1;
                        stats.events_sent += report.events;
                    }
                    RunOutcome::Failed(_) => stats.runs_failed += 1,
                    RunOutcome::Disabled | RunOutcome::Idle => {}
                }

                match stop_rx.recv_timeout(poll_interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }

            tracing::info!(
                worker = %name,
                polls = stats.polls,
                events = stats.events_sent,
                "dispatch worker stopped"
            );
            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the worker to stop and wait for it to finish.
    /// Returns the worker statistics.
    pub fn stop(mut self) -> WorkerStats {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap_or_default()
        } else {
            WorkerStats::default()
        }
    }

    /// Signal the worker to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for DispatchWorkerThread {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        // Don't join on drop - let the thread finish naturally
    }
}
