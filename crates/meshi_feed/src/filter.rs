//! Feed filter
//!
//! `threshold(s) = 0.7 * s + 20`, so the threshold spans 20 (s = 0) to 90 (s = 100).
//! Inclusion is decided in integers (`10 * goal >= 7 * s + 200`), which agrees
//! with the float formula for every sensitivity and goal match in range.

use meshi_core::SignalPost;
use serde::{Deserialize, Serialize};

pub const MAX_SENSITIVITY: u8 = 100;

/// Signal tuner position, always within 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sensitivity(u8);

impl Sensitivity {
    pub const MIN: Sensitivity = Sensitivity(0);
    pub const MAX: Sensitivity = Sensitivity(MAX_SENSITIVITY);

    /// Clamp to the control's range.
    pub fn new(value: u8) -> Self {
        Self(value.min(MAX_SENSITIVITY))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Minimum goal match for an item to be visible, 20.0-90.0.
    pub fn threshold(self) -> f64 {
        self.0 as f64 * 0.7 + 20.0
    }

    /// `goal_match >= threshold()`, evaluated exactly.
    pub fn admits(self, goal_match: u8) -> bool {
        10 * goal_match as u32 >= 7 * self.0 as u32 + 200
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self(50)
    }
}

impl From<u8> for Sensitivity {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

pub fn is_visible(signal: &SignalPost, sensitivity: Sensitivity) -> bool {
    sensitivity.admits(signal.goal_match())
}

/// Visible subsequence of `signals`, original order preserved. May be empty.
pub fn filter_signals(signals: &[SignalPost], sensitivity: Sensitivity) -> Vec<&SignalPost> {
    signals
        .iter()
        .filter(|s| is_visible(s, sensitivity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshi_core::seed_signals;

    fn visible_ids(sensitivity: u8) -> Vec<String> {
        let signals = seed_signals();
        filter_signals(&signals, Sensitivity::new(sensitivity))
            .into_iter()
            .map(|s| s.id.to_string())
            .collect()
    }

    #[test]
    fn test_threshold_range() {
        assert_eq!(Sensitivity::MIN.threshold(), 20.0);
        assert_eq!(Sensitivity::MAX.threshold(), 90.0);
        assert_eq!(Sensitivity::new(50).threshold(), 55.0);
    }

    #[test]
    fn test_new_clamps() {
        assert_eq!(Sensitivity::new(250).value(), 100);
        assert_eq!(Sensitivity::from(7).value(), 7);
    }

    #[test]
    fn test_boundary_at_fifty() {
        let s = Sensitivity::new(50);
        assert!(!s.admits(54));
        assert!(s.admits(55));
    }

    #[test]
    fn test_admits_matches_float_formula() {
        for s in 0..=MAX_SENSITIVITY {
            let sensitivity = Sensitivity::new(s);
            for goal in 0..=100u8 {
                assert_eq!(
                    sensitivity.admits(goal),
                    goal as f64 >= sensitivity.threshold(),
                    "s={s} goal={goal}"
                );
            }
        }
    }

    #[test]
    fn test_seed_all_visible_at_zero() {
        assert_eq!(visible_ids(0), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_seed_only_top_match_at_max() {
        // threshold 90: only the 92% guitarist signal clears it
        assert_eq!(visible_ids(100), vec!["1"]);
    }

    #[test]
    fn test_seed_order_preserved_mid_range() {
        // s = 90 → threshold 83: 92, 88, 85 pass; 76, 72 do not
        assert_eq!(visible_ids(90), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_empty_catalog() {
        assert!(filter_signals(&[], Sensitivity::MIN).is_empty());
    }
}
