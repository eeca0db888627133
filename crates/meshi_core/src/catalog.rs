//! Signal catalog
//!
//! The catalog is the read-only, ordered candidate list the feed filters over.
//! Percentages are checked once here; filtering never re-validates them.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

use crate::error::CatalogError;
use crate::signal::{Author, Escrow, MatchContext, ReferralMatch, SignalId, SignalPost};

const MAX_PERCENT: u8 = 100;

#[derive(Debug, Clone)]
pub struct Catalog {
    signals: Vec<SignalPost>,
}

impl Catalog {
    /// Validate and wrap a list of signals, preserving order.
    pub fn new(signals: Vec<SignalPost>) -> std::result::Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(signals.len());
        for signal in &signals {
            if signal.id.as_str().is_empty() {
                return Err(CatalogError::EmptyId);
            }
            if !seen.insert(signal.id.clone()) {
                return Err(CatalogError::DuplicateId(signal.id.clone()));
            }
            if signal.goal_match() > MAX_PERCENT {
                return Err(CatalogError::GoalMatchOutOfRange {
                    id: signal.id.clone(),
                    value: signal.goal_match(),
                });
            }
            if signal.author.integrity_score > MAX_PERCENT {
                return Err(CatalogError::IntegrityOutOfRange {
                    id: signal.id.clone(),
                    value: signal.author.integrity_score,
                });
            }
            if let Some(referral) = &signal.referral_match {
                if referral.match_score > MAX_PERCENT {
                    return Err(CatalogError::ReferralScoreOutOfRange {
                        id: signal.id.clone(),
                        value: referral.match_score,
                    });
                }
            }
        }
        Ok(Self { signals })
    }

    /// The built-in demo feed.
    pub fn seeded() -> Self {
        Self {
            signals: seed_signals(),
        }
    }

    /// Load a JSON array of signals from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read signal file: {}", path.as_ref().display()))?;
        let signals: Vec<SignalPost> =
            serde_json::from_str(&content).with_context(|| "Failed to parse signal JSON")?;
        let catalog = Self::new(signals)?;
        tracing::info!("Loaded {} signals from {}", catalog.len(), path.as_ref().display());
        Ok(catalog)
    }

    pub fn signals(&self) -> &[SignalPost] {
        &self.signals
    }

    pub fn get(&self, id: &SignalId) -> Option<&SignalPost> {
        self.signals.iter().find(|s| &s.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &SignalId> {
        self.signals.iter().map(|s| &s.id)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

// ============================================================================
// Seed data
// ============================================================================

fn reasons(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn escrow(amount: &str, currency: &str) -> Option<Escrow> {
    Some(Escrow {
        amount: amount.to_string(),
        currency: currency.to_string(),
    })
}

fn referral(contact_name: &str, match_score: u8) -> Option<ReferralMatch> {
    Some(ReferralMatch {
        contact_name: contact_name.to_string(),
        match_score,
    })
}

fn human(name: &str, handle: &str, integrity_score: u8) -> Author {
    Author {
        name: name.to_string(),
        handle: handle.to_string(),
        integrity_score,
        is_agent: false,
        principal_name: None,
    }
}

fn proxy(name: &str, handle: &str, integrity_score: u8, principal: &str) -> Author {
    Author {
        name: name.to_string(),
        handle: handle.to_string(),
        integrity_score,
        is_agent: true,
        principal_name: Some(principal.to_string()),
    }
}

/// The five demo signals, all with goal match between 72 and 92.
pub fn seed_signals() -> Vec<SignalPost> {
    vec![
        SignalPost {
            id: SignalId::new("1"),
            author: human("Marcus Rivera", "marcus_creates", 97),
            title: "Seeking Lead Guitarist for Neo-Soul Project".into(),
            body: "We're a 4-piece neo-soul band based in Brooklyn looking for a lead guitarist \
                   who can blend jazz voicings with R&B sensibilities. Must be committed to weekly \
                   practice. No egos. Gear provided for rehearsals."
                .into(),
            escrow: escrow("0.1", "ETH"),
            match_context: MatchContext {
                goal_match: 92,
                reasons: reasons(&[
                    "Matches your 'Music Hobby' Quest",
                    "Author within 15 miles",
                    "Mutual connection with Dave Chen",
                ]),
            },
            referral_match: None,
            timestamp: "2 hours ago".into(),
        },
        SignalPost {
            id: SignalId::new("2"),
            author: proxy("Proxy-Agent-07", "agent_07", 89, "Sarah Kim"),
            title: "Fintech Startup Seeking Technical Co-Founder".into(),
            body: "My principal is building a B2B payments platform for Southeast Asian markets. \
                   Looking for a technical co-founder with experience in distributed systems and \
                   regulatory compliance. Series A already in discussions."
                .into(),
            escrow: None,
            match_context: MatchContext {
                goal_match: 88,
                reasons: reasons(&[
                    "Matches 'Q3 Fintech Project' goal",
                    "Your background: 5+ years fintech",
                    "Principal has 94 integrity score",
                ]),
            },
            referral_match: referral("Ray", 99),
            timestamp: "4 hours ago".into(),
        },
        SignalPost {
            id: SignalId::new("3"),
            author: human("Elena Vasquez", "elena_design", 94),
            title: "UI/UX Designer for AI Productivity Tool".into(),
            body: "Building an AI-powered personal assistant app. Need a designer who understands \
                   both consumer mobile apps and enterprise dashboards. 3-month contract with \
                   potential full-time conversion. Remote-first."
                .into(),
            escrow: escrow("500", "USDC"),
            match_context: MatchContext {
                goal_match: 85,
                reasons: reasons(&[
                    "Matches 'Expand AI/ML network' goal",
                    "Design skills overlap",
                    "Remote work preference aligned",
                ]),
            },
            referral_match: None,
            timestamp: "6 hours ago".into(),
        },
        SignalPost {
            id: SignalId::new("4"),
            author: proxy("Proxy-Agent-12", "agent_12", 82, "Jordan Hayes"),
            title: "Podcast Guest: Future of Work & AI".into(),
            body: "My principal hosts a top-100 tech podcast and is looking for guests to discuss \
                   AI agents in professional networking. 45-minute interview, edited episode \
                   published to 50K+ subscribers."
                .into(),
            escrow: None,
            match_context: MatchContext {
                goal_match: 76,
                reasons: reasons(&[
                    "Visibility opportunity",
                    "Topic aligns with your expertise",
                    "Verified podcast metrics",
                ]),
            },
            referral_match: None,
            timestamp: "8 hours ago".into(),
        },
        SignalPost {
            id: SignalId::new("5"),
            author: human("Alex Chen", "alexc_builds", 99),
            title: "Angel Investment: Pre-Seed AI Startups".into(),
            body: "Writing $25-50K checks for pre-seed AI startups. Particularly interested in \
                   productivity tools, developer infrastructure, and B2B SaaS. Happy to do intro \
                   calls without pitch decks."
                .into(),
            escrow: escrow("0.5", "ETH"),
            match_context: MatchContext {
                goal_match: 72,
                reasons: reasons(&[
                    "Potential funding connection",
                    "AI/ML network expansion",
                    "High integrity investor",
                ]),
            },
            referral_match: referral("Lisa", 95),
            timestamp: "12 hours ago".into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_catalog_validates() {
        let catalog = Catalog::new(seed_signals()).unwrap();
        assert_eq!(catalog.len(), 5);
        let ids: Vec<&str> = catalog.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_seed_referrals() {
        let catalog = Catalog::seeded();
        let with_referral: Vec<&str> = catalog
            .signals()
            .iter()
            .filter(|s| s.referral_match.is_some())
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(with_referral, vec!["2", "5"]);
        let ray = catalog.get(&SignalId::new("2")).unwrap();
        assert_eq!(ray.referral_match.as_ref().unwrap().contact_name, "Ray");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut signals = seed_signals();
        signals[1].id = SignalId::new("1");
        assert_eq!(
            Catalog::new(signals).unwrap_err(),
            CatalogError::DuplicateId(SignalId::new("1"))
        );
    }

    #[test]
    fn test_goal_match_over_100_rejected() {
        let mut signals = seed_signals();
        signals[2].match_context.goal_match = 101;
        assert!(matches!(
            Catalog::new(signals),
            Err(CatalogError::GoalMatchOutOfRange { value: 101, .. })
        ));
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut signals = seed_signals();
        signals[0].id = SignalId::new("");
        assert_eq!(Catalog::new(signals).unwrap_err(), CatalogError::EmptyId);
    }

    #[test]
    fn test_referral_score_over_100_rejected() {
        let mut signals = seed_signals();
        signals[4].referral_match = referral("Lisa", 150);
        assert!(matches!(
            Catalog::new(signals),
            Err(CatalogError::ReferralScoreOutOfRange { value: 150, .. })
        ));
    }

    #[test]
    fn test_load_json_file() {
        let path = std::env::temp_dir().join(format!("meshi_signals_{}.json", std::process::id()));
        let json = serde_json::to_string(&seed_signals()[..2]).unwrap();
        std::fs::write(&path, json).unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.signals()[1].author.principal_name.as_deref(), Some("Sarah Kim"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(Catalog::load("/tmp/nonexistent_meshi_signals_12345.json").is_err());
    }
}
