//! # Meshi Ether
//!
//! The single session object the presentation layer talks to. It reads the
//! signal catalog, holds the tuner position, forwards dispatch and retry
//! hooks to the simulator, and records referrals.
//!
//! All state is process-local and starts fresh with every `Ether`.

mod error;
mod session;

pub use error::EtherError;
pub use session::{Ether, EtherSnapshot, Referral, SessionActivity, SignalView};
