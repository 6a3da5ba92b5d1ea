//! OperationQueue: starts operations as dependencies and the concurrency
//! ceiling allow.
//!
//! The queue learns that an operation finished **only** from the operation's
//! `IsFinished` After notification. It never polls flags to make progress.
//! That is what makes a silent operation stall it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

use super::{DependencyGraph, QueueConfig, QueueCounts};
use crate::domain::{OperationId, StateKey, SubscriptionId};
use crate::error::QueueError;
use crate::operation::Operation;

struct Tracked {
    operation: Arc<dyn Operation>,
    subscription: SubscriptionId,
}

#[derive(Default)]
struct QueueState {
    /// Every operation we hold a subscription on (enqueued or depended upon).
    /// An entry is dropped once its finish is heard, so the map only holds
    /// operations that can still matter.
    tracked: HashMap<OperationId, Tracked>,

    /// Enqueued and not yet heard finishing, with enqueue sequence number.
    enqueued: HashMap<OperationId, u64>,
    next_seq: u64,

    /// Unmet dependencies, in enqueue order.
    waiting: Vec<OperationId>,
    ready: VecDeque<OperationId>,
    running: HashSet<OperationId>,

    finished_count: usize,
    peak_running: usize,

    graph: DependencyGraph,
}

struct Inner {
    config: QueueConfig,
    state: Mutex<QueueState>,
    outstanding: watch::Sender<usize>,
}

/// A queue that runs operations respecting dependency edges and a ceiling
/// on how many may be running at once.
pub struct OperationQueue {
    inner: Arc<Inner>,
}

impl OperationQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (outstanding, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(QueueState::default()),
                outstanding,
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Declare that `op` must not start before `depends_on` finishes.
    ///
    /// Must be called before `op` is enqueued. `depends_on` may be enqueued
    /// here, elsewhere, or started by hand.
    pub fn add_dependency(
        &self,
        op: Arc<dyn Operation>,
        depends_on: Arc<dyn Operation>,
    ) -> Result<(), QueueError> {
        let (id, dep) = (op.id(), depends_on.id());
        {
            let mut state = self.inner.lock();
            if state.enqueued.contains_key(&id) {
                return Err(QueueError::DependencyAfterEnqueue(id));
            }
            if let Some(cycle) = state.graph.cycle_with(id, dep) {
                return Err(QueueError::DependencyCycle(cycle));
            }
            state.graph.add_dependency(id, dep);
            self.inner.track(&mut state, &depends_on);
        }
        tracing::debug!(queue = %self.inner.config.name, op = %id, depends_on = %dep, "dependency added");

        // It may have finished before we subscribed; the edge is then
        // released right away.
        if depends_on.is_finished() {
            self.inner.on_finished(dep);
        }
        Ok(())
    }

    /// Hand an operation to the queue. It starts as soon as it is eligible.
    pub fn add_operation(&self, op: Arc<dyn Operation>) -> Result<(), QueueError> {
        let id = op.id();
        {
            let mut state = self.inner.lock();
            if state.enqueued.contains_key(&id) {
                return Err(QueueError::AlreadyEnqueued(id));
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.enqueued.insert(id, seq);
            self.inner.track(&mut state, &op);

            if state.graph.has_dependencies(id) && !op.is_cancelled() {
                state.waiting.push(id);
            } else {
                state.graph.clear_dependencies(id);
                state.ready.push_back(id);
            }
            self.inner.publish(&state);
        }
        tracing::debug!(queue = %self.inner.config.name, op = %id, name = op.name(), "enqueued");

        if op.is_finished() {
            self.inner.on_finished(id);
        }
        self.inner.drain();
        Ok(())
    }

    /// Cancel every operation the queue still holds.
    ///
    /// Cancelled operations that were waiting on dependencies become eligible
    /// at once; starting them only marks them finished.
    pub fn cancel_all_operations(&self) {
        let operations: Vec<Arc<dyn Operation>> = {
            let state = self.inner.lock();
            let mut held: Vec<(u64, Arc<dyn Operation>)> = state
                .enqueued
                .iter()
                .filter_map(|(id, seq)| {
                    state
                        .tracked
                        .get(id)
                        .map(|t| (*seq, Arc::clone(&t.operation)))
                })
                .collect();
            held.sort_by_key(|(seq, _)| *seq);
            held.into_iter().map(|(_, op)| op).collect()
        };
        tracing::info!(queue = %self.inner.config.name, count = operations.len(), "cancelling all operations");

        for op in &operations {
            op.cancel();
        }

        {
            let mut state = self.inner.lock();
            let waiting = std::mem::take(&mut state.waiting);
            for id in waiting {
                state.graph.clear_dependencies(id);
                state.ready.push_back(id);
            }
            self.inner.publish(&state);
        }
        self.inner.drain();
    }

    /// Resolves once every enqueued operation has been heard finishing.
    ///
    /// Never resolves if an operation finishes without telling anyone; bound
    /// it with `tokio::time::timeout`.
    pub async fn wait_until_all_finished(&self) {
        let mut rx = self.inner.outstanding.subscribe();
        let _ = rx.wait_for(|outstanding| *outstanding == 0).await;
    }

    pub fn counts(&self) -> QueueCounts {
        let state = self.inner.lock();
        QueueCounts {
            waiting: state.waiting.len(),
            ready: state.ready.len(),
            running: state.running.len(),
            finished: state.finished_count,
        }
    }

    /// Enqueued operations not yet heard finishing.
    pub fn operation_count(&self) -> usize {
        self.inner.lock().enqueued.len()
    }

    /// Highest number of operations the queue had running at once.
    pub fn peak_running(&self) -> usize {
        self.inner.lock().peak_running
    }
}

impl Drop for OperationQueue {
    fn drop(&mut self) {
        let tracked: Vec<Tracked> = {
            let mut state = self.inner.lock();
            state.tracked.drain().map(|(_, t)| t).collect()
        };
        for t in tracked {
            t.operation.unobserve(t.subscription);
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &QueueState) {
        self.outstanding.send_replace(state.enqueued.len());
    }

    /// Subscribe to `op`'s finish notification, once.
    fn track(self: &Arc<Self>, state: &mut QueueState, op: &Arc<dyn Operation>) {
        let id = op.id();
        if state.tracked.contains_key(&id) {
            return;
        }
        let weak: Weak<Inner> = Arc::downgrade(self);
        let subscription = op.observe(
            StateKey::IsFinished,
            Arc::new(move |event| {
                if !event.became_true(StateKey::IsFinished) {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    inner.on_finished(event.operation);
                }
            }),
        );
        state.tracked.insert(
            id,
            Tracked {
                operation: Arc::clone(op),
                subscription,
            },
        );
    }

    fn on_finished(self: &Arc<Self>, id: OperationId) {
        let released = {
            let mut state = self.lock();
            // Untracked means already heard (or never ours): nothing to do.
            let Some(tracked) = state.tracked.remove(&id) else {
                return;
            };
            state.running.remove(&id);
            state.waiting.retain(|w| *w != id);
            state.ready.retain(|r| *r != id);
            if state.enqueued.remove(&id).is_some() {
                state.finished_count += 1;
            }

            let mut unblocked: Vec<(u64, OperationId)> = Vec::new();
            for w in state.graph.get_waiting(id) {
                state.graph.remove_dependency(w, id);
                if !state.graph.has_dependencies(w) && state.waiting.contains(&w) {
                    state.waiting.retain(|x| *x != w);
                    let seq = state.enqueued.get(&w).copied().unwrap_or(u64::MAX);
                    unblocked.push((seq, w));
                }
            }
            unblocked.sort();
            for (_, w) in &unblocked {
                state.ready.push_back(*w);
            }
            self.publish(&state);
            (tracked, unblocked.len())
        };

        let (tracked, unblocked) = released;
        tracing::debug!(queue = %self.config.name, op = %id, unblocked, "finish heard");
        tracked.operation.unobserve(tracked.subscription);
        self.drain();
    }

    /// Start ready operations while there is room under the ceiling.
    fn drain(self: &Arc<Self>) {
        let limit = self.config.limit();
        loop {
            let op = {
                let mut state = self.lock();
                if state.running.len() >= limit {
                    break;
                }
                let Some(id) = state.ready.pop_front() else {
                    break;
                };
                let Some(op) = state.tracked.get(&id).map(|t| Arc::clone(&t.operation)) else {
                    continue;
                };
                state.running.insert(id);
                state.peak_running = state.peak_running.max(state.running.len());
                op
            };
            // Lock released: start may finish synchronously and re-enter.
            tracing::debug!(queue = %self.config.name, op = %op.id(), name = op.name(), "starting operation");
            if let Err(e) = op.start() {
                tracing::warn!(queue = %self.config.name, error = %e, "operation refused to start");
            }
        }
    }
}
