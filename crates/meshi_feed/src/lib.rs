//! # Meshi Feed
//!
//! The read side of the Ether:
//!
//! - **Filter**: sensitivity → visibility threshold → visible subsequence
//! - **Tuner**: named sensitivity levels, presets and headline stats
//! - **Ledger**: the timer-driven log of moderation decisions shown beside the feed

pub mod filter;
pub mod ledger;
pub mod tuner;

pub use filter::{filter_signals, is_visible, Sensitivity};
pub use ledger::{LedgerCounts, LedgerEntry, LedgerKind, ProcessingLedger};
pub use tuner::{FilterStats, TunerLevel, TunerPreset, TUNER_PRESETS};
