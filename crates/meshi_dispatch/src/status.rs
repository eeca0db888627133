//! Dispatch status machine
//!
//! Pure transition table. Timing and randomness live in the simulator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    #[default]
    Idle,
    Syncing,
    Checking,
    Verifying,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    /// `draw` uniform in [0, 1): success iff it lands below `success_probability`.
    pub fn from_draw(draw: f64, success_probability: f64) -> Self {
        if draw < success_probability {
            Outcome::Success
        } else {
            Outcome::Failed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// User asked to dispatch (pool already checked).
    Request,
    /// Simulated latency for the current stage has passed.
    StageElapsed,
    /// Verification finished with a drawn outcome.
    Resolve(Outcome),
    /// User asked to try a failed dispatch again.
    Retry,
    /// Pending timers were torn down before the outcome.
    Abort,
}

impl DispatchStatus {
    pub fn apply(self, transition: Transition) -> Result<Self, DispatchError> {
        use DispatchStatus::*;
        let next = match (self, transition) {
            (Idle, Transition::Request) => Syncing,
            (Syncing, Transition::StageElapsed) => Checking,
            (Checking, Transition::StageElapsed) => Verifying,
            (Verifying, Transition::Resolve(Outcome::Success)) => Success,
            (Verifying, Transition::Resolve(Outcome::Failed)) => Failed,
            (Failed, Transition::Retry) => Idle,
            (Syncing | Checking | Verifying, Transition::Abort) => Idle,
            (from, transition) => {
                return Err(DispatchError::InvalidTransition { from, transition })
            }
        };
        Ok(next)
    }

    /// A handshake stage is running.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            DispatchStatus::Syncing | DispatchStatus::Checking | DispatchStatus::Verifying
        )
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, DispatchStatus::Success | DispatchStatus::Failed)
    }

    /// Progress / result line shown on the card. `None` while idle.
    pub fn display_text(&self) -> Option<&'static str> {
        match self {
            DispatchStatus::Idle => None,
            DispatchStatus::Syncing => Some("Syncing Integrity Protocols..."),
            DispatchStatus::Checking => Some("Checking Availability..."),
            DispatchStatus::Verifying => Some("Verifying Credentials..."),
            DispatchStatus::Success => Some("Channel Open"),
            DispatchStatus::Failed => Some("Agent Declined"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Idle => "idle",
            DispatchStatus::Syncing => "syncing",
            DispatchStatus::Checking => "checking",
            DispatchStatus::Verifying => "verifying",
            DispatchStatus::Success => "success",
            DispatchStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
