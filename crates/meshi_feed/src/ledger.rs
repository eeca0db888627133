//! Processing Ledger
//!
//! A scrolling log of the moderation decisions the user's agent is "making"
//! on the wider feed. Purely simulated: each entry is a weighted random pick
//! from fixed message lists, appended on a timer. Newest first, bounded.

use chrono::{DateTime, Utc};
use meshi_core::{LedgerConfig, RandomSource};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// Entry model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Blocked,
    Saved,
    Passed,
    Warning,
}

const BLOCK_REASONS: &[&str] = &[
    "Blocked: Crypto Spam",
    "Blocked: Low Integrity (23)",
    "Blocked: Unverified Source",
    "Blocked: Off-topic (Marketing)",
    "Blocked: Duplicate Post",
    "Blocked: Bot Network Detected",
    "Blocked: Missing Context",
];

const SAVE_REASONS: &[&str] = &[
    "Saved: Bandmate Inquiry",
    "Saved: Potential Collaboration",
    "Saved: Industry Contact",
    "Saved: Referral Opportunity",
];

const PASS_REASONS: &[&str] = &[
    "Passed: 87% Goal Match",
    "Passed: Verified Escrow",
    "Passed: Mutual Connection",
    "Passed: High Integrity (94)",
];

const WARNING_REASONS: &[&str] = &[
    "Warning: New Account",
    "Warning: First Post",
    "Warning: No Mutual Connections",
];

impl LedgerKind {
    /// Weighted pick: 55% blocked, 20% saved, 15% passed, 10% warning.
    pub fn from_draw(r: f64) -> Self {
        if r < 0.55 {
            LedgerKind::Blocked
        } else if r < 0.75 {
            LedgerKind::Saved
        } else if r < 0.9 {
            LedgerKind::Passed
        } else {
            LedgerKind::Warning
        }
    }

    pub fn messages(&self) -> &'static [&'static str] {
        match self {
            LedgerKind::Blocked => BLOCK_REASONS,
            LedgerKind::Saved => SAVE_REASONS,
            LedgerKind::Passed => PASS_REASONS,
            LedgerKind::Warning => WARNING_REASONS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Blocked => "blocked",
            LedgerKind::Saved => "saved",
            LedgerKind::Passed => "passed",
            LedgerKind::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub kind: LedgerKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Two draws: one for the kind, one for the message within it.
    pub fn draw(random: &dyn RandomSource) -> Self {
        let kind = LedgerKind::from_draw(random.next_f64());
        let messages = kind.messages();
        let message = messages[random.pick(messages.len())].to_string();
        Self {
            id: Uuid::new_v4(),
            kind,
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Footer tallies. "Flagged" in the UI is `warning`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerCounts {
    pub blocked: usize,
    pub saved: usize,
    pub passed: usize,
    pub warning: usize,
}

impl LedgerCounts {
    pub fn total(&self) -> usize {
        self.blocked + self.saved + self.passed + self.warning
    }
}

// ============================================================================
// Ledger
// ============================================================================

pub struct ProcessingLedger {
    config: LedgerConfig,
    random: Arc<dyn RandomSource>,
    entries: Arc<RwLock<VecDeque<LedgerEntry>>>,
    /// Current entry count, for callers waiting on the feed to fill.
    len: Arc<watch::Sender<usize>>,
    cancel: CancellationToken,
}

impl ProcessingLedger {
    pub fn new(config: LedgerConfig, random: Arc<dyn RandomSource>) -> Self {
        Self {
            config,
            random,
            entries: Arc::new(RwLock::new(VecDeque::new())),
            len: Arc::new(watch::channel(0).0),
            cancel: CancellationToken::new(),
        }
    }

    /// Append one random entry, dropping the oldest past capacity.
    pub async fn record(&self) -> LedgerEntry {
        push_entry(&self.entries, &self.len, self.random.as_ref(), self.config.capacity).await
    }

    /// Newest first.
    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Resolve once at least `n` entries are held, capped at capacity.
    ///
    /// Returns early if the ledger is stopped first.
    pub async fn wait_for_entries(&self, n: usize) {
        let target = n.min(self.config.capacity);
        let mut rx = self.len.subscribe();
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = rx.wait_for(|len| *len >= target) => {}
        }
    }

    pub async fn counts(&self) -> LedgerCounts {
        let entries = self.entries.read().await;
        let mut counts = LedgerCounts::default();
        for entry in entries.iter() {
            match entry.kind {
                LedgerKind::Blocked => counts.blocked += 1,
                LedgerKind::Saved => counts.saved += 1,
                LedgerKind::Passed => counts.passed += 1,
                LedgerKind::Warning => counts.warning += 1,
            }
        }
        counts
    }

    /// Steady-state period: `min + r * jitter`, drawn once per ledger.
    fn tick_period(&self) -> Duration {
        let jitter = self.config.interval_jitter_ms as f64 * self.random.next_f64();
        Duration::from_millis(self.config.min_interval_ms + jitter as u64).max(Duration::from_millis(1))
    }

    /// Spawn the feed: an initial burst, then one entry per period until stopped.
    pub fn start(&self) -> JoinHandle<()> {
        let entries = Arc::clone(&self.entries);
        let len = Arc::clone(&self.len);
        let random = Arc::clone(&self.random);
        let cancel = self.cancel.clone();
        let capacity = self.config.capacity;
        let burst = self.config.initial_burst;
        let spacing = Duration::from_millis(self.config.burst_spacing_ms);
        let period = self.tick_period();
        let started = tokio::time::Instant::now();

        tracing::debug!("Processing ledger started (period {:?})", period);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(started + period, period);

            for i in 0..burst {
                if i > 0 {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(spacing) => {}
                    }
                }
                push_entry(&entries, &len, random.as_ref(), capacity).await;
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let entry = push_entry(&entries, &len, random.as_ref(), capacity).await;
                        tracing::trace!("ledger: {}", entry.message);
                    }
                }
            }
            tracing::debug!("Processing ledger stopped");
        })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ProcessingLedger {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn push_entry(
    entries: &RwLock<VecDeque<LedgerEntry>>,
    len: &watch::Sender<usize>,
    random: &dyn RandomSource,
    capacity: usize,
) -> LedgerEntry {
    let entry = LedgerEntry::draw(random);
    let mut guard = entries.write().await;
    guard.push_front(entry.clone());
    guard.truncate(capacity);
    len.send_replace(guard.len());
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshi_core::{FixedRandom, ScriptedRandom};

    fn ledger_with(config: LedgerConfig, random: impl RandomSource + 'static) -> ProcessingLedger {
        ProcessingLedger::new(config, Arc::new(random))
    }

    #[test]
    fn test_kind_weights() {
        assert_eq!(LedgerKind::from_draw(0.0), LedgerKind::Blocked);
        assert_eq!(LedgerKind::from_draw(0.549), LedgerKind::Blocked);
        assert_eq!(LedgerKind::from_draw(0.55), LedgerKind::Saved);
        assert_eq!(LedgerKind::from_draw(0.75), LedgerKind::Passed);
        assert_eq!(LedgerKind::from_draw(0.9), LedgerKind::Warning);
        assert_eq!(LedgerKind::from_draw(0.999), LedgerKind::Warning);
    }

    #[test]
    fn test_draw_picks_message_of_kind() {
        // kind draw 0.8 → passed; message draw 0.5 → index 2 of 4
        let random = ScriptedRandom::new([0.8, 0.5]);
        let entry = LedgerEntry::draw(&random);
        assert_eq!(entry.kind, LedgerKind::Passed);
        assert_eq!(entry.message, "Passed: Mutual Connection");
    }

    #[tokio::test]
    async fn test_record_is_newest_first_and_bounded() {
        let config = LedgerConfig {
            capacity: 3,
            ..LedgerConfig::default()
        };
        let ledger = ledger_with(config, ScriptedRandom::new([0.0, 0.0, 0.6, 0.0, 0.8, 0.0, 0.95, 0.0]));

        for _ in 0..4 {
            ledger.record().await;
        }

        let kinds: Vec<LedgerKind> = ledger.entries().await.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![LedgerKind::Warning, LedgerKind::Passed, LedgerKind::Saved]
        );
        let counts = ledger.counts().await;
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.blocked, 0);
        assert_eq!(counts.warning, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_interval() {
        // FixedRandom(0.0): every entry blocked, period = min_interval (800ms)
        let ledger = ledger_with(LedgerConfig::default(), FixedRandom(0.0));
        let handle = ledger.start();

        tokio::time::sleep(Duration::from_millis(750)).await;
        assert_eq!(ledger.entries().await.len(), 8);

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(ledger.entries().await.len(), 10);
        assert_eq!(ledger.counts().await.blocked, 10);

        ledger.stop();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ledger.entries().await.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_entries_covers_burst_and_ticks() {
        let ledger = ledger_with(LedgerConfig::default(), FixedRandom(0.0));
        let _handle = ledger.start();

        // 8 from the burst plus two 800ms ticks
        ledger.wait_for_entries(10).await;
        assert!(ledger.entries().await.len() >= 10);

        // Asking past capacity settles at capacity instead of hanging
        let small = ledger_with(
            LedgerConfig {
                capacity: 3,
                ..LedgerConfig::default()
            },
            FixedRandom(0.0),
        );
        let _small_handle = small.start();
        small.wait_for_entries(20).await;
        assert_eq!(small.entries().await.len(), 3);
        ledger.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_entries_returns_when_stopped() {
        let ledger = ledger_with(LedgerConfig::default(), FixedRandom(0.0));
        ledger.stop();
        ledger.wait_for_entries(5).await;
        assert!(ledger.entries().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_holds_over_long_run() {
        let config = LedgerConfig {
            capacity: 50,
            min_interval_ms: 100,
            interval_jitter_ms: 0,
            ..LedgerConfig::default()
        };
        let ledger = ledger_with(config, meshi_core::SeededRandom::new(3));
        let _handle = ledger.start();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ledger.entries().await.len(), 50);
        ledger.stop();
    }
}
