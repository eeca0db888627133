//! # Meshi Core
//!
//! Shared foundation for the Ether feed simulation:
//!
//! - **Signals**: the immutable candidate records shown in the feed
//! - **Catalog**: the validated, ordered list of signals (seeded or loaded from JSON)
//! - **Config**: TOML configuration with environment overrides
//! - **Random**: injectable random sources so simulated outcomes are reproducible

pub mod catalog;
pub mod config;
pub mod error;
pub mod random;
pub mod signal;

pub use catalog::{seed_signals, Catalog};
pub use config::{
    DispatchConfig, FeedConfig, FocusConfig, LedgerConfig, MeshiConfig,
};
pub use error::CatalogError;
pub use random::{FixedRandom, RandomSource, ScriptedRandom, SeededRandom};
pub use signal::{
    Author, Escrow, IntegrityTier, MatchContext, ReferralMatch, SignalId, SignalPost,
};
