//! # Meshi Dispatch
//!
//! Simulated agent handshake for a single signal:
//!
//! ```text
//! idle → syncing → checking → verifying → success | failed
//!                                           failed → (retry) → idle
//! ```
//!
//! Each stage waits a fixed simulated latency on a [`Timer`]; the outcome is a
//! single draw from an injected [`meshi_core::RandomSource`]. Accepting a
//! dispatch reserves one focus point; success keeps it, failure or shutdown
//! hands it back.

mod error;
mod pool;
mod simulator;
mod status;
mod timer;

pub use error::DispatchError;
pub use pool::FocusPool;
pub use simulator::{DispatchEvent, DispatchSimulator, DispatchSnapshot};
pub use status::{DispatchStatus, Outcome, Transition};
pub use timer::{Timer, TokioTimer};
