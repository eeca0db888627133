use meshi_core::SignalId;
use meshi_dispatch::{DispatchError, DispatchStatus};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EtherError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("unknown signal: {0}")]
    UnknownSignal(SignalId),

    #[error("signal {0} has no referral match")]
    NoReferral(SignalId),

    #[error("signal {id} routes to {expected}, not {requested}")]
    ReferralMismatch {
        id: SignalId,
        expected: String,
        requested: String,
    },

    #[error("signal {id} is {status}; referral requires idle")]
    ReferralNotIdle { id: SignalId, status: DispatchStatus },
}

pub type Result<T> = std::result::Result<T, EtherError>;
