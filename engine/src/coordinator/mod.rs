//! SearchCoordinator - fans a query out to providers and gates their output
//!
//! Each search runs one unit of work per target provider. A unit drives its
//! provider's sink and hands every batch to [`SearchCoordinator::deliver`],
//! which stamps and emits it only while the unit's epoch is still current.
//!
//! The session lock is the gate: deliveries hold the read side across the
//! currency check, the token stamp and the emit; starting a new epoch takes
//! the write side. Once `search` returns, nothing from an older epoch can be
//! emitted.

mod lane;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use lancea_model::{BatchPayload, Epoch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::epoch::EpochManager;
use crate::events::{EngineEvent, EventBus};
use crate::provider::{BatchSink, Provider, ProviderError, ProviderRegistry, Query, SinkItem};
use crate::task::join_error_to_provider_error;

use lane::{Session, SharedLane, lock_lane};

/// One provider's share of one search
struct Unit {
    epoch: Epoch,
    provider_id: String,
    provider: Arc<dyn Provider>,
    lane: SharedLane,
    cancel: CancellationToken,
}

enum UnitExit {
    Drained,
    Cancelled,
    TimedOut,
}

struct Shared {
    epochs: Arc<EpochManager>,
    providers: Arc<ProviderRegistry>,
    bus: Arc<EventBus>,
    session: RwLock<Session>,
    batch_buffer: usize,
    search_timeout: Duration,
}

/// Cheap to clone; every clone drives the same sessions
#[derive(Clone)]
pub struct SearchCoordinator {
    shared: Arc<Shared>,
}

impl SearchCoordinator {
    pub fn new(
        epochs: Arc<EpochManager>,
        providers: Arc<ProviderRegistry>,
        bus: Arc<EventBus>,
        config: &EngineConfig,
    ) -> Self {
        debug!(
            batch_buffer = config.batch_buffer,
            search_timeout_ms = config.search_timeout_ms,
            "SearchCoordinator::new"
        );
        let current = epochs.current();
        Self {
            shared: Arc::new(Shared {
                epochs,
                providers,
                bus,
                session: RwLock::new(Session::new(current)),
                batch_buffer: config.batch_buffer.max(1),
                search_timeout: config.search_timeout(),
            }),
        }
    }

    /// Start (or continue) a search and return its epoch
    ///
    /// A zero or non-current `requested` epoch starts a new epoch and
    /// supersedes every in-flight unit. The current epoch is reused, and
    /// token counters for providers already active in it carry on.
    ///
    /// Returns before any provider has produced anything. Must be called
    /// from within a tokio runtime.
    pub fn search(&self, text: &str, provider_ids: &[String], requested: Epoch) -> Epoch {
        debug!(%text, ?provider_ids, %requested, "SearchCoordinator::search: called");
        let targets = self.shared.providers.select(provider_ids);

        let (epoch, units) = {
            let mut session = self.write_session();
            let reuse = !requested.is_none() && requested == session.epoch && self.shared.epochs.is_current(requested);

            let epoch = if reuse {
                if session.cancel.is_cancelled() {
                    debug!(epoch = %requested, "SearchCoordinator::search: reviving cancelled epoch");
                    session.cancel = CancellationToken::new();
                }
                requested
            } else {
                let epoch = self.shared.epochs.new_epoch();
                session.cancel.cancel();
                *session = Session::new(epoch);
                epoch
            };

            let units: Vec<Unit> = targets
                .into_iter()
                .map(|provider| {
                    let provider_id = provider.id().to_string();
                    Unit {
                        epoch,
                        lane: session.lane(&provider_id),
                        cancel: session.cancel.child_token(),
                        provider_id,
                        provider,
                    }
                })
                .collect();
            (epoch, units)
        };

        info!(%epoch, providers = units.len(), "Search dispatched");
        let query = Query {
            text: text.to_string(),
            epoch,
            provider_ids: provider_ids.to_vec(),
        };
        for unit in units {
            tokio::spawn(self.clone().run_unit(unit, query.clone()));
        }
        epoch
    }

    /// Cancel the in-flight work of `epoch` if it is current
    ///
    /// The epoch stays current; a later search with the same epoch revives
    /// it. Returns false when `epoch` is not current.
    pub fn cancel(&self, epoch: Epoch) -> bool {
        let session = self.write_session();
        if epoch.is_none() || session.epoch != epoch {
            debug!(%epoch, current = %session.epoch, "SearchCoordinator::cancel: not current, ignoring");
            return false;
        }
        info!(%epoch, "Search cancelled");
        session.cancel.cancel();
        true
    }

    /// Whether `key` was delivered by `provider_id` in `epoch`, which must be current
    pub fn is_key_live(&self, epoch: Epoch, provider_id: &str, key: &str) -> bool {
        let session = self.read_session();
        if epoch.is_none() || session.epoch != epoch {
            return false;
        }
        session
            .lanes
            .get(provider_id)
            .is_some_and(|lane| lock_lane(lane).contains_key(key))
    }

    pub fn current_epoch(&self) -> Epoch {
        self.shared.epochs.current()
    }

    /// Cancel whatever is in flight
    pub fn shutdown(&self) {
        debug!("SearchCoordinator::shutdown: called");
        self.write_session().cancel.cancel();
    }

    async fn run_unit(self, unit: Unit, query: Query) {
        debug!(epoch = %unit.epoch, provider_id = %unit.provider_id, "SearchCoordinator::run_unit: starting");
        let (sink, mut rx) = BatchSink::channel(self.shared.batch_buffer, unit.cancel.clone());
        let provider = unit.provider.clone();
        let mut worker = tokio::spawn(async move { provider.search(&query, sink).await });

        let deadline = Instant::now() + self.shared.search_timeout;
        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        let exit = loop {
            tokio::select! {
                biased;
                _ = unit.cancel.cancelled() => break UnitExit::Cancelled,
                _ = &mut expiry => break UnitExit::TimedOut,
                item = rx.recv() => match item {
                    Some(SinkItem::Batch(batch)) => {
                        if !self.deliver(&unit, batch) {
                            unit.cancel.cancel();
                            break UnitExit::Cancelled;
                        }
                    }
                    Some(SinkItem::Error(err)) => self.report(&unit, err),
                    None => break UnitExit::Drained,
                },
            }
        };

        match exit {
            UnitExit::Cancelled => {
                debug!(epoch = %unit.epoch, provider_id = %unit.provider_id, "SearchCoordinator::run_unit: cancelled");
                worker.abort();
            }
            UnitExit::TimedOut => self.time_out(&unit, worker),
            UnitExit::Drained => match tokio::time::timeout_at(deadline, &mut worker).await {
                Err(_) => self.time_out(&unit, worker),
                Ok(Ok(Ok(()))) => {
                    self.deliver(&unit, BatchPayload::End);
                }
                Ok(Ok(Err(ProviderError::Cancelled))) => {
                    debug!(provider_id = %unit.provider_id, "SearchCoordinator::run_unit: provider stopped on cancel");
                }
                Ok(Ok(Err(err))) => self.report(&unit, err),
                Ok(Err(join_err)) => match join_error_to_provider_error(join_err) {
                    ProviderError::Cancelled => {}
                    err => self.report(&unit, err),
                },
            },
        }
        debug!(epoch = %unit.epoch, provider_id = %unit.provider_id, "SearchCoordinator::run_unit: finished");
    }

    /// Stamp and emit a batch if its epoch is still live
    ///
    /// Returns false when the batch was discarded.
    fn deliver(&self, unit: &Unit, batch: BatchPayload) -> bool {
        let session = self.read_session();
        if !session.accepts(unit.epoch) || unit.cancel.is_cancelled() || !self.shared.epochs.is_current(unit.epoch) {
            debug!(
                epoch = %unit.epoch,
                current = %session.epoch,
                provider_id = %unit.provider_id,
                kind = batch.kind(),
                "SearchCoordinator::deliver: discarding stale batch"
            );
            return false;
        }

        let mut lane = lock_lane(&unit.lane);
        let token = lane.stamp(&batch);
        debug!(
            epoch = %unit.epoch,
            provider_id = %unit.provider_id,
            token,
            kind = batch.kind(),
            items = batch.items().len(),
            "SearchCoordinator::deliver"
        );
        self.shared
            .bus
            .emit(EngineEvent::results(unit.epoch, unit.provider_id.clone(), token, batch));
        true
    }

    /// Emit a ProviderError if the unit's epoch is still live
    fn report(&self, unit: &Unit, err: ProviderError) {
        let session = self.read_session();
        if !session.accepts(unit.epoch) || unit.cancel.is_cancelled() {
            debug!(epoch = %unit.epoch, provider_id = %unit.provider_id, error = %err, "SearchCoordinator::report: epoch gone, dropping error");
            return;
        }
        warn!(epoch = %unit.epoch, provider_id = %unit.provider_id, code = err.code(), error = %err, "Provider error");
        self.shared.bus.emit(EngineEvent::provider_error(
            unit.epoch,
            unit.provider_id.clone(),
            err.to_payload(),
        ));
    }

    fn time_out(&self, unit: &Unit, worker: JoinHandle<Result<(), ProviderError>>) {
        self.report(
            unit,
            ProviderError::Timeout {
                timeout_ms: self.shared.search_timeout.as_millis() as u64,
            },
        );
        unit.cancel.cancel();
        worker.abort();
    }

    fn read_session(&self) -> RwLockReadGuard<'_, Session> {
        self.shared.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, Session> {
        self.shared.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}
