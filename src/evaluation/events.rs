//! The aggregation trigger: events published after a group changes, and the
//! background worker that recalculates the group's outcome in response.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::future::{BoxFuture, FutureExt},
    tokio::{
        self,
        sync::{mpsc, Mutex},
        time::Duration,
    },
    Build, Rocket,
};

use super::{aggregation::Aggregator, store::EvaluationStore, Evaluations};
use crate::{
    config::Config,
    error::Error,
    model::{common::GroupCode, mongodb::Id},
    scheduled_task::ScheduledTask,
};

/// What changed in the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventCause {
    ResponseSubmitted { request_id: Id },
    MemberDeleted { request_id: Id },
    GroupDeleted,
}

/// A group may need its outcome recalculated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationEvent {
    pub question_id: Id,
    pub code: GroupCode,
    pub cause: EventCause,
}

/// Somewhere to send aggregation events.
///
/// Publishing never blocks and never fails: the operation that triggered the
/// event has already committed by the time it is published.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: AggregationEvent);
}

/// Publishes events onto a queue drained by an `AggregationWorker`.
pub struct AggregationQueue {
    sender: mpsc::UnboundedSender<AggregationEvent>,
}

impl AggregationQueue {
    /// Spawn a worker and return the queue feeding it.
    /// Must be called from within a Tokio runtime.
    pub fn start(aggregator: Aggregator, retry_interval: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = AggregationWorker::new(aggregator, retry_interval);
        tokio::spawn(worker.run(receiver));
        Self { sender }
    }
}

impl EventPublisher for AggregationQueue {
    fn publish(&self, event: AggregationEvent) {
        trace!("Publishing {event:?}");
        if let Err(e) = self.sender.send(event) {
            error!(
                "Aggregation worker has stopped, dropping event for group {}",
                e.0.code
            );
        }
    }
}

/// Groups identified by question and code.
type GroupKey = (Id, GroupCode);

/// Map from groups to their pending retries.
type RetryMap = HashMap<GroupKey, ScheduledTask<()>>;

/// Recalculates groups as events arrive, one at a time.
/// Failed recalculations are retried after a fixed interval.
pub struct AggregationWorker {
    aggregator: Aggregator,
    retry_interval: Duration,
    retries: Arc<Mutex<RetryMap>>,
}

impl AggregationWorker {
    pub fn new(aggregator: Aggregator, retry_interval: Duration) -> Self {
        Self {
            aggregator,
            retry_interval,
            retries: Default::default(),
        }
    }

    /// Process events until every sender has been dropped.
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<AggregationEvent>) {
        debug!("Aggregation worker started");
        while let Some(event) = receiver.recv().await {
            self.handle(event).await;
        }
        debug!("Aggregation queue closed, worker stopping");
    }

    /// Does the given group have a retry pending?
    pub async fn has_retry(&self, question_id: Id, code: &GroupCode) -> bool {
        self.retries
            .lock()
            .await
            .contains_key(&(question_id, code.clone()))
    }

    pub async fn handle(&self, event: AggregationEvent) {
        debug!("Recalculating group {} after {:?}", event.code, event.cause);
        let key = (event.question_id, event.code);

        // A pending retry may already have read the group before this change,
        // so it is cancelled and the group recalculated afresh. Cancelling waits
        // for a running retry to stop, which may itself have scheduled another.
        loop {
            let pending = self.retries.lock().await.remove(&key);
            match pending {
                Some(retry) => {
                    if retry.cancel().await {
                        trace!("Retry for group {} finished before it was cancelled", key.1);
                    }
                }
                None => break,
            }
        }

        Self::recalculation(
            key,
            self.aggregator.clone(),
            self.retries.clone(),
            self.retry_interval,
        )
        .await;
    }

    /// Recalculate a group, scheduling a retry of itself on failure.
    /// Since this is a recursive async function, we must use `BoxFuture` to
    /// avoid an infinitely-recursive state machine.
    fn recalculation(
        key: GroupKey,
        aggregator: Aggregator,
        retries: Arc<Mutex<RetryMap>>,
        retry_interval: Duration,
    ) -> BoxFuture<'static, ()> {
        async move {
            let (question_id, ref code) = key;
            match aggregator.recalculate(question_id, code).await {
                Ok(outcome) => {
                    retries.lock().await.remove(&key);
                    trace!("Group {code} recalculated: {outcome:?}");
                }
                Err(Error::NotFound(ref what)) => {
                    retries.lock().await.remove(&key);
                    warn!("Group {code} can no longer be evaluated: {what} not found");
                }
                Err(e) => {
                    error!("Recalculating group {code} of question {question_id} failed: {e}");
                    let retry = Self::recalculation(
                        key.clone(),
                        aggregator,
                        retries.clone(),
                        retry_interval,
                    );
                    let mut retries_locked = retries.lock().await;
                    retries_locked.insert(key, ScheduledTask::after(retry_interval, retry));
                    warn!(
                        "Failed recalculation will be retried in {} seconds",
                        retry_interval.as_secs()
                    );
                }
            }
        }
        .boxed()
    }
}

/// A fairing that starts the aggregation worker during Rocket ignition and
/// places an `Evaluations` into managed state.
/// This fairing depends on the config and the store being available in
/// managed state, and so must be attached after the fairings responsible for them.
pub struct AggregationFairing;

#[rocket::async_trait]
impl Fairing for AggregationFairing {
    fn info(&self) -> Info {
        Info {
            name: "Aggregation Worker",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let retry_interval = match rocket.state::<Config>() {
            Some(config) => config.aggregation_retry(),
            None => {
                error!("Config was not available when starting the aggregation worker");
                return Err(rocket);
            }
        };
        let store = match rocket.state::<Arc<dyn EvaluationStore>>() {
            Some(store) => store.clone(),
            None => {
                error!("Store was not available when starting the aggregation worker");
                return Err(rocket);
            }
        };

        let queue = AggregationQueue::start(Aggregator::new(store.clone()), retry_interval);
        info!("Aggregation worker started");

        Ok(rocket.manage(Evaluations::new(store, Arc::new(queue))))
    }
}

/// Collects published events instead of acting on them.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingPublisher {
    events: std::sync::Mutex<Vec<AggregationEvent>>,
}

#[cfg(test)]
impl RecordingPublisher {
    /// Everything published so far.
    pub fn events(&self) -> Vec<AggregationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: AggregationEvent) {
        self.events.lock().unwrap().push(event);
    }
}
