use chrono::Utc;

use crate::channel::{Channel, ChannelRouter};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::outbox::{mark_chunks, partition, OutboxStore};
use crate::serialize::EventSerializer;

/// Counters for one successful run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub events: usize,
    pub partitions: usize,
    pub messages_sent: usize,
    pub sent_per_connection: Vec<usize>,
    pub chunks_marked: usize,
    pub rows_marked: usize,
}

/// How a run ended. Runs never fail from the scheduler's point of view;
/// `Failed` only carries the reason for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The downstream channel is switched off.
    Disabled,
    /// Nothing pending.
    Idle,
    Dispatched(DispatchReport),
    Failed(DispatchError),
}

impl RunOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed(_))
    }

    pub fn report(&self) -> Option<&DispatchReport> {
        match self {
            RunOutcome::Dispatched(report) => Some(report),
            _ => None,
        }
    }
}

/// Periodic outbox drain: fetch, partition, serialize, send, mark sent.
///
/// Invocations are expected not to overlap; the job has no re-entrancy
/// guard of its own.
pub struct DispatchJob<S, Z, C: Channel> {
    store: S,
    serializer: Z,
    router: ChannelRouter<C>,
    config: DispatchConfig,
}

impl<S, Z, C> DispatchJob<S, Z, C>
where
    S: OutboxStore,
    Z: EventSerializer,
    C: Channel,
{
    /// Validate the configuration and open `connection_count` connections.
    pub fn new(
        store: S,
        serializer: Z,
        channel: C,
        config: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        let router = ChannelRouter::connect(channel, config.connection_count)?;
        Ok(Self {
            store,
            serializer,
            router,
            config,
        })
    }

    /// Build around an already connected router.
    pub fn with_router(
        store: S,
        serializer: Z,
        router: ChannelRouter<C>,
        config: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self {
            store,
            serializer,
            router,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn router(&self) -> &ChannelRouter<C> {
        &self.router
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run once, logging and swallowing any failure.
    pub fn run_once(&self) -> RunOutcome {
        match self.try_run_once() {
            Ok(RunOutcome::Dispatched(report)) => {
                tracing::info!(
                    events = report.events,
                    partitions = report.partitions,
                    chunks = report.chunks_marked,
                    "dispatched outbox batch"
                );
                RunOutcome::Dispatched(report)
            }
            Ok(outcome) => {
                tracing::debug!(outcome = ?outcome, "outbox dispatch run had nothing to do");
                outcome
            }
            Err(err) => {
                tracing::error!(stage = err.stage(), error = %err, "outbox dispatch run failed");
                RunOutcome::Failed(err)
            }
        }
    }

    /// Run once, returning the error that ended the run early.
    ///
    /// Never returns `RunOutcome::Failed`.
    pub fn try_run_once(&self) -> Result<RunOutcome, DispatchError> {
        if !self.config.enabled || !self.router.is_enabled() {
            return Ok(RunOutcome::Disabled);
        }

        let batch = self.store.fetch_pending(self.config.batch_size)?;
        if batch.is_empty() {
            return Ok(RunOutcome::Idle);
        }

        let events = batch.len();
        let ids: Vec<i64> = batch.iter().map(|event| event.id).collect();

        let encoded = partition(batch)
            .into_iter()
            .map(|group| {
                group.try_map(|event| {
                    self.serializer
                        .serialize(&event)
                        .map_err(|source| DispatchError::Serialize {
                            event_id: event.id,
                            source,
                        })
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let route = self.router.dispatch(encoded)?;

        let (chunks_marked, rows_marked) = self.mark_sent(&ids)?;

        Ok(RunOutcome::Dispatched(DispatchReport {
            events,
            partitions: route.partitions,
            messages_sent: route.total_sent(),
            sent_per_connection: route.sent_per_connection,
            chunks_marked,
            rows_marked,
        }))
    }

    /// Mark the batch sent, one statement per chunk. Stops at the first
    /// failing chunk; earlier chunks stay marked.
    fn mark_sent(&self, ids: &[i64]) -> Result<(usize, usize), DispatchError> {
        let sent_at = Utc::now();
        let mut chunks = 0;
        let mut rows = 0;

        for chunk in mark_chunks(ids, self.config.partition_size) {
            match self.store.mark_sent(chunk, sent_at) {
                Ok(updated) => {
                    chunks += 1;
                    rows += updated;
                }
                Err(err) => {
                    tracing::error!(
                        chunks_marked = chunks,
                        chunk_len = chunk.len(),
                        error = %err,
                        "mark sent failed; remaining rows stay pending"
                    );
                    return Err(err.into());
                }
            }
        }

        Ok((chunks, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InMemoryChannel;
    use crate::outbox::{InMemoryOutboxStore, NewOutboxEvent, OutboxStatus};
    use crate::serialize::{JsonSerializer, WireMessage};
    use chrono::NaiveDate;

    fn capture(store: &InMemoryOutboxStore, aggregate: Option<i64>) -> i64 {
        let mut event = NewOutboxEvent::new(
            "LoanRepaymentBusinessEvent",
            "LoanTransactionDataV1",
            b"{}".to_vec(),
            NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
            format!("idem-{:?}", aggregate),
        );
        event.aggregate_root_id = aggregate;
        store.append(event).unwrap()
    }

    fn job(
        store: &InMemoryOutboxStore,
        channel: &InMemoryChannel,
        config: DispatchConfig,
    ) -> DispatchJob<InMemoryOutboxStore, JsonSerializer, InMemoryChannel> {
        DispatchJob::new(store.clone(), JsonSerializer::new("loans"), channel.clone(), config)
            .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let result = DispatchJob::new(
            InMemoryOutboxStore::new(),
            JsonSerializer::new("loans"),
            InMemoryChannel::new(),
            DispatchConfig::default().with_batch_size(0),
        );
        assert!(matches!(result, Err(DispatchError::Config(_))));
    }

    #[test]
    fn disabled_config_is_a_noop() {
        let store = InMemoryOutboxStore::new();
        let channel = InMemoryChannel::new();
        capture(&store, Some(1));

        let job = job(&store, &channel, DispatchConfig::default().with_enabled(false));
        assert_eq!(job.run_once(), RunOutcome::Disabled);
        assert!(channel.is_empty());
        assert_eq!(store.pending_count().unwrap(), 1);
    }

    #[test]
    fn disabled_channel_is_a_noop() {
        let store = InMemoryOutboxStore::new();
        let channel = InMemoryChannel::new();
        capture(&store, Some(1));

        let job = job(&store, &channel, DispatchConfig::default());
        channel.set_enabled(false);
        assert_eq!(job.run_once(), RunOutcome::Disabled);

        channel.set_enabled(true);
        assert!(matches!(job.run_once(), RunOutcome::Dispatched(_)));
    }

    #[test]
    fn empty_outbox_is_idle() {
        let store = InMemoryOutboxStore::new();
        let channel = InMemoryChannel::new();
        let job = job(&store, &channel, DispatchConfig::default());

        assert_eq!(job.run_once(), RunOutcome::Idle);
        assert!(channel.is_empty());
    }

    #[test]
    fn batch_size_bounds_each_run() {
        let store = InMemoryOutboxStore::new();
        let channel = InMemoryChannel::new();
        for n in 0..5 {
            capture(&store, Some(n));
        }

        let job = job(&store, &channel, DispatchConfig::default().with_batch_size(2));
        let report = job.run_once().report().cloned().unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(store.pending_count().unwrap(), 3);

        job.run_once();
        job.run_once();
        assert_eq!(store.pending_count().unwrap(), 0);
        assert_eq!(job.run_once(), RunOutcome::Idle);
    }

    #[test]
    fn report_counts_chunks() {
        let store = InMemoryOutboxStore::new();
        let channel = InMemoryChannel::new();
        for n in 0..7 {
            capture(&store, Some(n % 3));
        }

        let config = DispatchConfig::default()
            .with_partition_size(3)
            .with_connection_count(3);
        let report = job(&store, &channel, config).run_once().report().cloned().unwrap();

        assert_eq!(report.events, 7);
        assert_eq!(report.partitions, 3);
        assert_eq!(report.messages_sent, 7);
        assert_eq!(report.sent_per_connection.iter().sum::<usize>(), 7);
        assert_eq!(report.chunks_marked, 3);
        assert_eq!(report.rows_marked, 7);
    }

    #[test]
    fn serialization_failure_sends_nothing() {
        let store = InMemoryOutboxStore::new();
        let channel = InMemoryChannel::new();
        capture(&store, Some(1));
        let mut broken = NewOutboxEvent::new(
            "LoanRepaymentBusinessEvent",
            "",
            Vec::new(),
            NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
            "idem-broken",
        );
        broken.aggregate_root_id = Some(2);
        let broken_id = store.append(broken).unwrap();

        let outcome = job(&store, &channel, DispatchConfig::default()).run_once();
        match outcome {
            RunOutcome::Failed(DispatchError::Serialize { event_id, .. }) => {
                assert_eq!(event_id, broken_id)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(channel.is_empty());
        assert_eq!(store.pending_count().unwrap(), 2);
    }

    #[test]
    fn sent_rows_carry_timestamp() {
        let store = InMemoryOutboxStore::new();
        let channel = InMemoryChannel::new();
        let id = capture(&store, None);

        job(&store, &channel, DispatchConfig::default()).run_once();

        let row = store.get(id).unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::Sent);
        assert!(row.sent_at.is_some());

        let message = WireMessage::from_json(&channel.deliveries()[0].payload).unwrap();
        assert_eq!(message.id, id);
    }
}
