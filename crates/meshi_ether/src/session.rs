//! Ether session
//!
//! Visible set = `{ s : s.goal_match >= threshold(sensitivity) }`, computed on
//! every read. Referrals never touch the focus pool or any dispatch slot.

use meshi_core::{Catalog, MeshiConfig, RandomSource, SeededRandom, SignalId, SignalPost};
use meshi_dispatch::{
    DispatchEvent, DispatchSimulator, DispatchSnapshot, DispatchStatus, FocusPool, Timer,
    TokioTimer,
};
use meshi_feed::{filter_signals, is_visible, FilterStats, Sensitivity, TunerLevel};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use crate::error::{EtherError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Referral {
    pub id: SignalId,
    pub contact_name: String,
}

/// "Session Activity" panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionActivity {
    pub dispatched: usize,
    pub referred: usize,
    /// Every other successful dispatch opens a channel straight away.
    pub channels_open: usize,
}

impl SessionActivity {
    fn new(dispatched: usize, referred: usize) -> Self {
        Self {
            dispatched,
            referred,
            channels_open: dispatched.div_ceil(2),
        }
    }
}

/// One card as the presentation layer would render it.
#[derive(Debug, Clone, Serialize)]
pub struct SignalView {
    pub id: SignalId,
    pub title: String,
    pub goal_match: u8,
    pub visible: bool,
    pub dispatch: DispatchSnapshot,
    pub referred: bool,
}

/// Everything observable about a session at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct EtherSnapshot {
    pub sensitivity: u8,
    pub threshold: f64,
    pub tuner_level: TunerLevel,
    pub filter_stats: FilterStats,
    pub visible: Vec<SignalId>,
    pub focus_points: u32,
    pub focus_capacity: u32,
    pub signals: Vec<SignalView>,
    pub dispatched: Vec<SignalId>,
    pub referred: Vec<Referral>,
    pub activity: SessionActivity,
}

pub struct Ether {
    catalog: Catalog,
    sensitivity: AtomicU8,
    simulator: DispatchSimulator,
    referred: RwLock<Vec<Referral>>,
}

impl Ether {
    /// Session from config; randomness seeded from `config.seed` when set.
    pub fn from_config(config: &MeshiConfig, catalog: Catalog) -> Self {
        let random = Arc::new(SeededRandom::from_option(config.seed));
        Self::new(config, catalog, random)
    }

    pub fn new(config: &MeshiConfig, catalog: Catalog, random: Arc<dyn RandomSource>) -> Self {
        Self::with_timer(config, catalog, random, Arc::new(TokioTimer))
    }

    pub fn with_timer(
        config: &MeshiConfig,
        catalog: Catalog,
        random: Arc<dyn RandomSource>,
        timer: Arc<dyn Timer>,
    ) -> Self {
        let pool = FocusPool::new(config.focus.initial, config.focus.capacity);
        let simulator = DispatchSimulator::with_timer(
            config.dispatch.clone(),
            catalog.ids().cloned(),
            pool,
            random,
            timer,
        );
        let sensitivity = Sensitivity::new(config.feed.initial_sensitivity);
        info!(
            "Ether session: {} signals, sensitivity {}, {} focus points",
            catalog.len(),
            sensitivity.value(),
            simulator.focus_points()
        );
        Self {
            catalog,
            sensitivity: AtomicU8::new(sensitivity.value()),
            simulator,
            referred: RwLock::new(Vec::new()),
        }
    }

    // ========================================================================
    // Feed
    // ========================================================================

    pub fn signals(&self) -> &[SignalPost] {
        self.catalog.signals()
    }

    pub fn sensitivity(&self) -> Sensitivity {
        Sensitivity::new(self.sensitivity.load(Ordering::Acquire))
    }

    /// Clamped to 0-100. Returns the stored value.
    pub fn set_sensitivity(&self, value: u8) -> Sensitivity {
        let sensitivity = Sensitivity::new(value);
        self.sensitivity.store(sensitivity.value(), Ordering::Release);
        tracing::debug!(
            "Sensitivity → {} (threshold {:.1})",
            sensitivity.value(),
            sensitivity.threshold()
        );
        sensitivity
    }

    pub fn visible(&self) -> Vec<&SignalPost> {
        filter_signals(self.catalog.signals(), self.sensitivity())
    }

    pub fn tuner_level(&self) -> TunerLevel {
        TunerLevel::for_sensitivity(self.sensitivity())
    }

    pub fn filter_stats(&self) -> FilterStats {
        FilterStats::for_sensitivity(self.sensitivity())
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    pub async fn request_dispatch(&self, id: &SignalId) -> Result<DispatchSnapshot> {
        // Held so a referral can't slip in between its idle check and its record.
        let _referred = self.referred.read().await;
        Ok(self.simulator.request_dispatch(id).await?)
    }

    pub async fn retry_dispatch(&self, id: &SignalId) -> Result<DispatchSnapshot> {
        Ok(self.simulator.retry_dispatch(id).await?)
    }

    /// Route an idle signal to the contact named in its referral match.
    ///
    /// Returns `false` if it had already been referred.
    pub async fn request_referral(&self, id: &SignalId, contact_name: &str) -> Result<bool> {
        let signal = self
            .catalog
            .get(id)
            .ok_or_else(|| EtherError::UnknownSignal(id.clone()))?;
        let referral = signal
            .referral_match
            .as_ref()
            .ok_or_else(|| EtherError::NoReferral(id.clone()))?;
        if referral.contact_name != contact_name {
            return Err(EtherError::ReferralMismatch {
                id: id.clone(),
                expected: referral.contact_name.clone(),
                requested: contact_name.to_string(),
            });
        }
        let mut referred = self.referred.write().await;
        let status = self
            .simulator
            .status(id)
            .await
            .unwrap_or(DispatchStatus::Idle);
        if status != DispatchStatus::Idle {
            return Err(EtherError::ReferralNotIdle {
                id: id.clone(),
                status,
            });
        }
        if referred.iter().any(|r| &r.id == id) {
            return Ok(false);
        }
        referred.push(Referral {
            id: id.clone(),
            contact_name: contact_name.to_string(),
        });
        info!("Signal {} routed to {}'s agent", id, contact_name);
        Ok(true)
    }

    // ========================================================================
    // Observables
    // ========================================================================

    pub async fn dispatch_state(&self, id: &SignalId) -> Option<DispatchSnapshot> {
        self.simulator.snapshot(id).await
    }

    pub fn focus_points(&self) -> u32 {
        self.simulator.focus_points()
    }

    pub fn focus_capacity(&self) -> u32 {
        self.simulator.focus_capacity()
    }

    pub async fn dispatched(&self) -> Vec<SignalId> {
        self.simulator.dispatched().await
    }

    pub async fn referred(&self) -> Vec<Referral> {
        self.referred.read().await.clone()
    }

    pub async fn activity(&self) -> SessionActivity {
        let dispatched = self.simulator.dispatched().await.len();
        let referred = self.referred.read().await.len();
        SessionActivity::new(dispatched, referred)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.simulator.subscribe()
    }

    pub async fn wait_settled(&self) {
        self.simulator.wait_settled().await
    }

    /// View unmount: abort pending handshakes and refund their points.
    pub fn shutdown(&self) {
        self.simulator.shutdown();
    }

    pub async fn snapshot(&self) -> EtherSnapshot {
        let sensitivity = self.sensitivity();
        let referred = self.referred().await;
        let dispatched = self.dispatched().await;

        let mut signals = Vec::with_capacity(self.catalog.len());
        for signal in self.catalog.signals() {
            let dispatch = self
                .simulator
                .snapshot(&signal.id)
                .await
                .unwrap_or(DispatchSnapshot {
                    status: DispatchStatus::Idle,
                    failure_reason: None,
                    attempts: 0,
                });
            signals.push(SignalView {
                id: signal.id.clone(),
                title: signal.title.clone(),
                goal_match: signal.goal_match(),
                visible: is_visible(signal, sensitivity),
                dispatch,
                referred: referred.iter().any(|r| r.id == signal.id),
            });
        }

        EtherSnapshot {
            sensitivity: sensitivity.value(),
            threshold: sensitivity.threshold(),
            tuner_level: TunerLevel::for_sensitivity(sensitivity),
            filter_stats: FilterStats::for_sensitivity(sensitivity),
            visible: signals
                .iter()
                .filter(|s| s.visible)
                .map(|s| s.id.clone())
                .collect(),
            focus_points: self.focus_points(),
            focus_capacity: self.focus_capacity(),
            activity: SessionActivity::new(dispatched.len(), referred.len()),
            signals,
            dispatched,
            referred,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshi_core::{FixedRandom, ScriptedRandom};
    use std::time::Duration;

    fn ether(random: impl RandomSource + 'static) -> Ether {
        Ether::new(&MeshiConfig::default(), Catalog::seeded(), Arc::new(random))
    }

    fn id(s: &str) -> SignalId {
        SignalId::new(s)
    }

    fn visible_ids(ether: &Ether) -> Vec<String> {
        ether.visible().iter().map(|s| s.id.to_string()).collect()
    }

    #[tokio::test]
    async fn test_default_session() {
        let ether = ether(FixedRandom(0.0));
        assert_eq!(ether.sensitivity().value(), 50);
        assert_eq!(ether.focus_points(), 12);
        assert_eq!(ether.focus_capacity(), 15);
        assert_eq!(ether.tuner_level(), TunerLevel::Focused);
        // threshold 55: every seed signal clears it
        assert_eq!(visible_ids(&ether), vec!["1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_visible_tracks_sensitivity() {
        let ether = ether(FixedRandom(0.0));
        ether.set_sensitivity(80); // threshold 76
        assert_eq!(visible_ids(&ether), vec!["1", "2", "3", "4"]);
        ether.set_sensitivity(90); // threshold 83
        assert_eq!(visible_ids(&ether), vec!["1", "2", "3"]);
        ether.set_sensitivity(0);
        assert_eq!(visible_ids(&ether).len(), 5);
        assert_eq!(ether.set_sensitivity(200).value(), 100);
        assert_eq!(visible_ids(&ether), vec!["1"]);
    }

    #[tokio::test]
    async fn test_referral_records_once_and_leaves_pool() {
        let ether = ether(FixedRandom(0.0));
        assert!(ether.request_referral(&id("2"), "Ray").await.unwrap());
        assert!(!ether.request_referral(&id("2"), "Ray").await.unwrap());
        assert_eq!(ether.focus_points(), 12);
        assert_eq!(
            ether.dispatch_state(&id("2")).await.unwrap().status,
            DispatchStatus::Idle
        );
        assert_eq!(
            ether.referred().await,
            vec![Referral {
                id: id("2"),
                contact_name: "Ray".into()
            }]
        );
        assert_eq!(ether.activity().await.referred, 1);
    }

    #[tokio::test]
    async fn test_referral_rejections() {
        let ether = ether(FixedRandom(0.0));
        assert_eq!(
            ether.request_referral(&id("1"), "Ray").await.unwrap_err(),
            EtherError::NoReferral(id("1"))
        );
        assert!(matches!(
            ether.request_referral(&id("5"), "Ray").await,
            Err(EtherError::ReferralMismatch { .. })
        ));
        assert_eq!(
            ether.request_referral(&id("42"), "Ray").await.unwrap_err(),
            EtherError::UnknownSignal(id("42"))
        );
        assert!(ether.referred().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_referral_requires_idle_dispatch() {
        let ether = ether(FixedRandom(0.0));
        ether.request_dispatch(&id("5")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            ether.request_referral(&id("5"), "Lisa").await,
            Err(EtherError::ReferralNotIdle {
                status: DispatchStatus::Syncing,
                ..
            })
        ));
        assert_eq!(ether.focus_points(), 11);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_referral_and_dispatch_stay_ordered() {
        for _ in 0..50 {
            let ether = Arc::new(ether(FixedRandom(0.0)));

            let refer = {
                let ether = Arc::clone(&ether);
                tokio::spawn(async move { ether.request_referral(&id("5"), "Lisa").await })
            };
            let dispatch = {
                let ether = Arc::clone(&ether);
                tokio::spawn(async move { ether.request_dispatch(&id("5")).await })
            };
            let referral = refer.await.unwrap();
            dispatch.await.unwrap().unwrap();

            // Either the referral ran first on an idle signal, or it saw the
            // accepted dispatch; never a record made after acceptance.
            match referral {
                Ok(recorded) => assert!(recorded),
                Err(e) => assert!(matches!(
                    e,
                    EtherError::ReferralNotIdle {
                        status: DispatchStatus::Syncing,
                        ..
                    }
                )),
            }
            assert_eq!(ether.focus_points(), 11);
            ether.shutdown();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_through_session() {
        let ether = ether(ScriptedRandom::new([0.99, 0.0]));
        ether.request_dispatch(&id("1")).await.unwrap();
        ether.wait_settled().await;
        let state = ether.dispatch_state(&id("1")).await.unwrap();
        assert_eq!(state.status, DispatchStatus::Failed);
        assert_eq!(ether.focus_points(), 12);

        ether.retry_dispatch(&id("1")).await.unwrap();
        ether.request_dispatch(&id("1")).await.unwrap();
        ether.wait_settled().await;
        assert_eq!(ether.dispatched().await, vec![id("1")]);
        assert_eq!(ether.focus_points(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_pool_surfaces_error() {
        let mut config = MeshiConfig::default();
        config.focus.initial = 0;
        let ether = Ether::new(&config, Catalog::seeded(), Arc::new(FixedRandom(0.0)));
        assert_eq!(
            ether.request_dispatch(&id("1")).await.unwrap_err(),
            EtherError::Dispatch(meshi_dispatch::DispatchError::FocusExhausted)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_channels_open() {
        let ether = ether(FixedRandom(0.0));
        for i in ["1", "2", "3"] {
            ether.request_dispatch(&id(i)).await.unwrap();
        }
        ether.wait_settled().await;
        let activity = ether.activity().await;
        assert_eq!(activity.dispatched, 3);
        assert_eq!(activity.channels_open, 2);
        assert_eq!(ether.focus_points(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_serializes() {
        let ether = ether(FixedRandom(0.0));
        ether.set_sensitivity(90);
        ether.request_referral(&id("2"), "Ray").await.unwrap();
        let snap = ether.snapshot().await;
        assert_eq!(snap.visible, vec![id("1"), id("2"), id("3")]);
        assert_eq!(snap.threshold, 83.0);
        assert_eq!(snap.signals.len(), 5);
        assert!(snap.signals[1].referred);
        assert!(!snap.signals[4].visible);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["tuner_level"], "high_signal");
        assert_eq!(json["signals"][0]["dispatch"]["status"], "idle");
        assert_eq!(json["activity"]["referred"], 1);
    }
}
