//! Dispatch rejection errors
//!
//! Every variant is returned before any state changes.

use meshi_core::SignalId;
use thiserror::Error;

use crate::status::{DispatchStatus, Transition};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("unknown signal: {0}")]
    UnknownSignal(SignalId),

    #[error("no focus points left")]
    FocusExhausted,

    #[error("signal {id} is {status}; dispatch requires idle")]
    NotIdle { id: SignalId, status: DispatchStatus },

    #[error("signal {id} is {status}; retry requires failed")]
    NotFailed { id: SignalId, status: DispatchStatus },

    #[error("dispatch simulator has shut down")]
    ShutDown,

    #[error("invalid transition from {from} on {transition:?}")]
    InvalidTransition {
        from: DispatchStatus,
        transition: Transition,
    },
}
