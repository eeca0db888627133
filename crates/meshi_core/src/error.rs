//! Catalog validation errors

use crate::signal::SignalId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("signal has an empty id")]
    EmptyId,

    #[error("duplicate signal id: {0}")]
    DuplicateId(SignalId),

    #[error("signal {id}: goal match {value} outside 0-100")]
    GoalMatchOutOfRange { id: SignalId, value: u8 },

    #[error("signal {id}: integrity score {value} outside 0-100")]
    IntegrityOutOfRange { id: SignalId, value: u8 },

    #[error("signal {id}: referral match score {value} outside 0-100")]
    ReferralScoreOutOfRange { id: SignalId, value: u8 },
}
