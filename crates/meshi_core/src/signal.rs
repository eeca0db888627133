//! Candidate signal records.
//!
//! A signal is created once from the seed list and never mutated afterwards.
//! Session flags (dispatched, referred) live in the session, not here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable opaque identifier of a signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(String);

impl SignalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPost {
    pub id: SignalId,
    pub author: Author,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escrow: Option<Escrow>,
    pub match_context: MatchContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_match: Option<ReferralMatch>,
    /// Display string such as "2 hours ago".
    pub timestamp: String,
}

impl SignalPost {
    /// Goal-match percentage, 0-100.
    pub fn goal_match(&self) -> u8 {
        self.match_context.goal_match
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub handle: String,
    /// Trust score 0-100.
    pub integrity_score: u8,
    /// Proxy agent posting on behalf of a principal.
    pub is_agent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_name: Option<String>,
}

impl Author {
    pub fn tier(&self) -> IntegrityTier {
        IntegrityTier::from_score(self.integrity_score)
    }

    /// "Proxy" or "Human" badge text.
    pub fn kind_label(&self) -> &'static str {
        if self.is_agent {
            "Proxy"
        } else {
            "Human"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escrow {
    /// Kept as written in the seed ("0.1", "500").
    pub amount: String,
    pub currency: String,
}

impl fmt::Display for Escrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    pub goal_match: u8,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// A contact in the user's network who matches the signal better than the user does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralMatch {
    pub contact_name: String,
    pub match_score: u8,
}

/// Trust ring shown around an author's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityTier {
    Exemplary,
    Trusted,
    Moderate,
    Low,
}

impl IntegrityTier {
    pub fn from_score(score: u8) -> Self {
        match score {
            95..=u8::MAX => IntegrityTier::Exemplary,
            80..=94 => IntegrityTier::Trusted,
            60..=79 => IntegrityTier::Moderate,
            _ => IntegrityTier::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityTier::Exemplary => "exemplary",
            IntegrityTier::Trusted => "trusted",
            IntegrityTier::Moderate => "moderate",
            IntegrityTier::Low => "low",
        }
    }
}
