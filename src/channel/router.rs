use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::error::SendError;
use crate::outbox::{Partition, PartitionKey};

use super::{consistent_hash, Channel, Connection};

/// Messages sent per connection during one `dispatch` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteReport {
    pub partitions: usize,
    pub sent_per_connection: Vec<usize>,
}

impl RouteReport {
    pub fn total_sent(&self) -> usize {
        self.sent_per_connection.iter().sum()
    }
}

/// Fixed pool of channel connections, one worker thread and one queue each.
///
/// Connections are opened once in `connect`, reused by every `dispatch`, and
/// closed when the router is shut down or dropped. A connection is also
/// closed if its worker unwinds or if opening a later connection fails.
/// A panicking send is reported as `SendError::Panicked`; the worker and its
/// connection stay in service for the next dispatch.
pub struct ChannelRouter<C: Channel> {
    // Fields drop in order: workers close their connections before the
    // channel that opened them goes away.
    workers: Vec<Worker>,
    channel: C,
}

impl<C: Channel> ChannelRouter<C> {
    /// Open `connection_count` connections (at least one) and start a worker
    /// for each.
    pub fn connect(channel: C, connection_count: usize) -> Result<Self, SendError> {
        let count = connection_count.max(1);

        let mut guards = Vec::with_capacity(count);
        for index in 0..count {
            guards.push(ConnectionGuard::new(index, channel.connect(index)?));
        }

        let mut workers = Vec::with_capacity(count);
        for guard in guards {
            workers.push(Worker::spawn(guard)?);
        }

        tracing::debug!(connections = count, "channel router connected");
        Ok(Self { workers, channel })
    }

    /// Number of connections in the pool.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn is_enabled(&self) -> bool {
        self.channel.is_enabled()
    }

    /// Connection slot for a partition key.
    pub fn route(&self, key: PartitionKey) -> usize {
        consistent_hash(key, self.workers.len())
    }

    /// Send every partition over its routed connection and wait for all
    /// connections to finish.
    ///
    /// Partitions routed to the same connection are sent in the given order,
    /// each partition's messages strictly in sequence. A failed send stops the
    /// rest of that connection's work. The first error (by connection index)
    /// is returned after every connection has reported.
    pub fn dispatch(&self, partitions: Vec<Partition<Vec<u8>>>) -> Result<RouteReport, SendError> {
        let mut report = RouteReport {
            partitions: partitions.len(),
            sent_per_connection: vec![0; self.workers.len()],
        };

        let mut per_connection: Vec<Vec<Partition<Vec<u8>>>> =
            (0..self.workers.len()).map(|_| Vec::new()).collect();
        for partition in partitions {
            let index = self.route(partition.key);
            per_connection[index].push(partition);
        }

        let (reply_tx, reply_rx) = channel();
        let mut errors: Vec<(usize, SendError)> = Vec::new();
        let mut pending = vec![false; self.workers.len()];

        for (index, partitions) in per_connection.into_iter().enumerate() {
            if partitions.is_empty() {
                continue;
            }
            let work = Work {
                partitions,
                reply: reply_tx.clone(),
            };
            match self.workers[index].submit(work) {
                Ok(()) => pending[index] = true,
                Err(err) => errors.push((index, err)),
            }
        }
        drop(reply_tx);

        // Replies stop arriving once every worker holding a reply sender has
        // answered or died.
        for outcome in reply_rx.iter() {
            pending[outcome.index] = false;
            report.sent_per_connection[outcome.index] = outcome.sent;
            if let Err(err) = outcome.result {
                errors.push((outcome.index, err));
            }
        }
        for (index, still_pending) in pending.into_iter().enumerate() {
            if still_pending {
                errors.push((index, SendError::WorkerGone(index)));
            }
        }

        errors.sort_by_key(|(index, _)| *index);
        match errors.into_iter().next() {
            Some((index, err)) => {
                tracing::warn!(connection = index, error = %err, "dispatch failed");
                Err(err)
            }
            None => Ok(report),
        }
    }

    /// Close every connection and wait for the workers to exit.
    pub fn shutdown(self) {
        // Dropping the workers closes their queues and joins them.
        drop(self);
    }
}

struct Work {
    partitions: Vec<Partition<Vec<u8>>>,
    reply: Sender<WorkOutcome>,
}

struct WorkOutcome {
    index: usize,
    sent: usize,
    result: Result<(), SendError>,
}

struct Worker {
    index: usize,
    queue: Option<Sender<Work>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn<T: Connection + 'static>(guard: ConnectionGuard<T>) -> Result<Self, SendError> {
        let index = guard.index;
        let (queue, inbox) = channel();

        let handle = thread::Builder::new()
            .name(format!("outbox-connection-{}", index))
            .spawn(move || run_worker(guard, inbox))
            .map_err(|e| SendError::ConnectionFailed {
                index,
                reason: e.to_string(),
            })?;

        Ok(Self {
            index,
            queue: Some(queue),
            handle: Some(handle),
        })
    }

    fn submit(&self, work: Work) -> Result<(), SendError> {
        self.queue
            .as_ref()
            .ok_or(SendError::WorkerGone(self.index))?
            .send(work)
            .map_err(|_| SendError::WorkerGone(self.index))
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.queue.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(connection = self.index, "connection worker panicked");
            }
        }
    }
}

fn run_worker<T: Connection>(mut guard: ConnectionGuard<T>, inbox: Receiver<Work>) {
    for work in inbox.iter() {
        let mut sent = 0;
        let mut result = Ok(());

        'partitions: for partition in &work.partitions {
            for message in &partition.items {
                if let Err(err) = send_catching_panic(&mut guard, message) {
                    tracing::error!(
                        connection = guard.index,
                        partition = %partition.key,
                        error = %err,
                        "send failed"
                    );
                    result = Err(err);
                    break 'partitions;
                }
                sent += 1;
            }
        }

        let _ = work.reply.send(WorkOutcome {
            index: guard.index,
            sent,
            result,
        });
    }
}

fn send_catching_panic<T: Connection>(
    guard: &mut ConnectionGuard<T>,
    message: &[u8],
) -> Result<(), SendError> {
    let index = guard.index;
    panic::catch_unwind(AssertUnwindSafe(|| guard.connection.send(message))).unwrap_or_else(
        |payload| {
            Err(SendError::Panicked {
                index,
                reason: panic_reason(payload.as_ref()),
            })
        },
    )
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        reason.to_string()
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.clone()
    } else {
        "send panicked".to_string()
    }
}

/// Owns one open connection and closes it on every exit path.
struct ConnectionGuard<T: Connection> {
    index: usize,
    connection: T,
}

impl<T: Connection> ConnectionGuard<T> {
    fn new(index: usize, connection: T) -> Self {
        Self { index, connection }
    }
}

impl<T: Connection> Drop for ConnectionGuard<T> {
    fn drop(&mut self) {
        match self.connection.close() {
            Ok(()) => tracing::debug!(connection = self.index, "connection closed"),
            Err(err) => {
                tracing::warn!(connection = self.index, error = %err, "failed to close connection")
            }
        }
    }
}
