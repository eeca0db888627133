//! Dispatch simulator
//!
//! Owns the per-signal status slots and the focus pool. Each accepted dispatch
//! runs as its own tokio task stepping through the stages on the injected
//! timer, so any number of signals can be mid-handshake at once.

use meshi_core::{DispatchConfig, RandomSource, SignalId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::pool::FocusPool;
use crate::status::{DispatchStatus, Outcome, Transition};
use crate::timer::{Timer, TokioTimer};

/// Observable state of one signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchSnapshot {
    pub status: DispatchStatus,
    /// Set only while `status == Failed`.
    pub failure_reason: Option<String>,
    /// Accepted dispatches so far, including the current one.
    pub attempts: u32,
}

impl DispatchSnapshot {
    pub fn display_text(&self) -> Option<&'static str> {
        self.status.display_text()
    }
}

/// Published on every status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchEvent {
    pub id: SignalId,
    pub status: DispatchStatus,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Default)]
struct Slot {
    status: DispatchStatus,
    failure_reason: Option<String>,
    attempt: u32,
}

impl Slot {
    fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            status: self.status,
            failure_reason: self.failure_reason.clone(),
            attempts: self.attempt,
        }
    }
}

struct Shared {
    config: DispatchConfig,
    pool: FocusPool,
    random: Arc<dyn RandomSource>,
    timer: Arc<dyn Timer>,
    slots: RwLock<HashMap<SignalId, Slot>>,
    /// Successful dispatches in completion order, each id at most once.
    dispatched: RwLock<Vec<SignalId>>,
    events: broadcast::Sender<DispatchEvent>,
    in_flight: watch::Sender<usize>,
    shutdown: CancellationToken,
}

impl Shared {
    fn publish(&self, id: &SignalId, slot: &Slot) {
        // No subscribers is fine.
        let _ = self.events.send(DispatchEvent {
            id: id.clone(),
            status: slot.status,
            failure_reason: slot.failure_reason.clone(),
        });
    }

    /// Apply a timer-driven transition if `attempt` is still the live one.
    async fn step(&self, id: &SignalId, attempt: u32, transition: Transition) -> bool {
        let mut slots = self.slots.write().await;
        let Some(slot) = slots.get_mut(id) else {
            return false;
        };
        if slot.attempt != attempt {
            debug!("Dropping stale {:?} for {} (attempt {})", transition, id, attempt);
            return false;
        }
        match slot.status.apply(transition) {
            Ok(next) => {
                slot.status = next;
                debug!("Dispatch {} → {}", id, next);
                self.publish(id, slot);
                true
            }
            Err(e) => {
                warn!("Dispatch {}: {}", id, e);
                false
            }
        }
    }

    async fn resolve(&self, id: &SignalId, attempt: u32, outcome: Outcome) {
        let mut slots = self.slots.write().await;
        let Some(slot) = slots.get_mut(id) else {
            return;
        };
        if slot.attempt != attempt {
            return;
        }
        match slot.status.apply(Transition::Resolve(outcome)) {
            Ok(next) => slot.status = next,
            Err(e) => {
                warn!("Dispatch {}: {}", id, e);
                return;
            }
        }

        match outcome {
            Outcome::Success => {
                let mut dispatched = self.dispatched.write().await;
                if !dispatched.contains(id) {
                    dispatched.push(id.clone());
                }
                info!(
                    "Dispatch {} succeeded (attempt {}), {} focus points left",
                    id,
                    attempt,
                    self.pool.level()
                );
            }
            Outcome::Failed => {
                slot.failure_reason = Some(self.config.failure_reason.clone());
                self.pool.refund();
                info!("Dispatch {} declined (attempt {}), point refunded", id, attempt);
            }
        }
        self.publish(id, slot);
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }

    async fn abort(&self, id: &SignalId, attempt: u32) {
        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get_mut(id) {
            if slot.attempt == attempt {
                if let Ok(next) = slot.status.apply(Transition::Abort) {
                    slot.status = next;
                    self.pool.refund();
                    debug!("Dispatch {} aborted, point refunded", id);
                    self.publish(id, slot);
                }
            }
        }
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// `false` if shutdown won the race.
    async fn wait(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = self.timer.sleep(delay) => true,
        }
    }
}

/// Drive one accepted dispatch to its outcome.
async fn run_handshake(shared: Arc<Shared>, id: SignalId, attempt: u32) {
    let stages = [shared.config.sync_delay(), shared.config.check_delay()];
    for delay in stages {
        if !shared.wait(delay).await {
            shared.abort(&id, attempt).await;
            return;
        }
        if !shared.step(&id, attempt, Transition::StageElapsed).await {
            shared.in_flight.send_modify(|n| *n = n.saturating_sub(1));
            return;
        }
    }

    if !shared.wait(shared.config.verify_delay()).await {
        shared.abort(&id, attempt).await;
        return;
    }
    let outcome = Outcome::from_draw(shared.random.next_f64(), shared.config.success_probability);
    shared.resolve(&id, attempt, outcome).await;
}

pub struct DispatchSimulator {
    shared: Arc<Shared>,
}

impl DispatchSimulator {
    /// Simulator over `ids`, all idle, on the tokio clock.
    pub fn new(
        config: DispatchConfig,
        ids: impl IntoIterator<Item = SignalId>,
        pool: FocusPool,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self::with_timer(config, ids, pool, random, Arc::new(TokioTimer))
    }

    pub fn with_timer(
        config: DispatchConfig,
        ids: impl IntoIterator<Item = SignalId>,
        pool: FocusPool,
        random: Arc<dyn RandomSource>,
        timer: Arc<dyn Timer>,
    ) -> Self {
        let slots = ids.into_iter().map(|id| (id, Slot::default())).collect();
        let (events, _) = broadcast::channel(64);
        let (in_flight, _) = watch::channel(0usize);
        Self {
            shared: Arc::new(Shared {
                config,
                pool,
                random,
                timer,
                slots: RwLock::new(slots),
                dispatched: RwLock::new(Vec::new()),
                events,
                in_flight,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Start a handshake. Reserves one focus point on acceptance.
    ///
    /// Rejections leave every slot and the pool untouched.
    pub async fn request_dispatch(&self, id: &SignalId) -> Result<DispatchSnapshot, DispatchError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(DispatchError::ShutDown);
        }

        let mut slots = self.shared.slots.write().await;
        let slot = slots
            .get_mut(id)
            .ok_or_else(|| DispatchError::UnknownSignal(id.clone()))?;
        if slot.status != DispatchStatus::Idle {
            return Err(DispatchError::NotIdle {
                id: id.clone(),
                status: slot.status,
            });
        }
        if !self.shared.pool.try_reserve() {
            warn!("Dispatch {} rejected: no focus points left", id);
            return Err(DispatchError::FocusExhausted);
        }

        slot.status = slot.status.apply(Transition::Request)?;
        slot.failure_reason = None;
        slot.attempt += 1;
        let attempt = slot.attempt;
        let snapshot = slot.snapshot();
        self.shared.publish(id, slot);
        self.shared.in_flight.send_modify(|n| *n += 1);
        drop(slots);

        info!(
            "Dispatch {} accepted (attempt {}), {} focus points left",
            id,
            attempt,
            self.shared.pool.level()
        );
        tokio::spawn(run_handshake(Arc::clone(&self.shared), id.clone(), attempt));
        Ok(snapshot)
    }

    /// Failed → idle. The next dispatch gets a fresh outcome draw.
    pub async fn retry_dispatch(&self, id: &SignalId) -> Result<DispatchSnapshot, DispatchError> {
        let mut slots = self.shared.slots.write().await;
        let slot = slots
            .get_mut(id)
            .ok_or_else(|| DispatchError::UnknownSignal(id.clone()))?;
        if slot.status != DispatchStatus::Failed {
            return Err(DispatchError::NotFailed {
                id: id.clone(),
                status: slot.status,
            });
        }
        slot.status = slot.status.apply(Transition::Retry)?;
        slot.failure_reason = None;
        self.shared.publish(id, slot);
        debug!("Dispatch {} reset for retry", id);
        Ok(slot.snapshot())
    }

    pub async fn snapshot(&self, id: &SignalId) -> Option<DispatchSnapshot> {
        self.shared.slots.read().await.get(id).map(Slot::snapshot)
    }

    pub async fn status(&self, id: &SignalId) -> Option<DispatchStatus> {
        self.shared.slots.read().await.get(id).map(|s| s.status)
    }

    pub fn focus_points(&self) -> u32 {
        self.shared.pool.level()
    }

    pub fn focus_capacity(&self) -> u32 {
        self.shared.pool.capacity()
    }

    /// Successful dispatches in completion order.
    pub async fn dispatched(&self) -> Vec<SignalId> {
        self.shared.dispatched.read().await.clone()
    }

    pub fn in_flight(&self) -> usize {
        *self.shared.in_flight.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.shared.events.subscribe()
    }

    /// Resolve once no handshake is running.
    pub async fn wait_settled(&self) {
        let mut rx = self.shared.in_flight.subscribe();
        // The sender lives in `shared`, which we hold, so this cannot close.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Tear down pending timers. In-flight signals return to idle and their
    /// reserved points are refunded; later requests are rejected.
    pub fn shutdown(&self) {
        if !self.shared.shutdown.is_cancelled() {
            info!("Dispatch simulator shutting down ({} in flight)", self.in_flight());
            self.shared.shutdown.cancel();
        }
    }
}

impl Drop for DispatchSimulator {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}
