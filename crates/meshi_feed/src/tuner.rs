//! Signal tuner: named levels over the sensitivity range and the headline
//! numbers shown under the slider.

use crate::filter::Sensitivity;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TunerLevel {
    Discovery,
    Balanced,
    Focused,
    HighSignal,
}

impl TunerLevel {
    pub fn for_sensitivity(sensitivity: Sensitivity) -> Self {
        match sensitivity.value() {
            85..=u8::MAX => TunerLevel::HighSignal,
            50..=84 => TunerLevel::Focused,
            20..=49 => TunerLevel::Balanced,
            _ => TunerLevel::Discovery,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TunerLevel::Discovery => "Discovery",
            TunerLevel::Balanced => "Balanced",
            TunerLevel::Focused => "Focused",
            TunerLevel::HighSignal => "High Signal",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TunerLevel::Discovery => "Broad opportunities and network chatter",
            TunerLevel::Balanced => "Moderate filtering with good coverage",
            TunerLevel::Focused => "High relevance, verified sources",
            TunerLevel::HighSignal => "95%+ goal match & verified escrow only",
        }
    }

    pub fn preset(&self) -> TunerPreset {
        match self {
            TunerLevel::Discovery => TUNER_PRESETS[0],
            TunerLevel::Balanced => TUNER_PRESETS[1],
            TunerLevel::Focused => TUNER_PRESETS[2],
            TunerLevel::HighSignal => TUNER_PRESETS[3],
        }
    }
}

/// One-click snap position for a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TunerPreset {
    pub level: TunerLevel,
    pub value: u8,
}

pub const TUNER_PRESETS: [TunerPreset; 4] = [
    TunerPreset {
        level: TunerLevel::Discovery,
        value: 0,
    },
    TunerPreset {
        level: TunerLevel::Balanced,
        value: 33,
    },
    TunerPreset {
        level: TunerLevel::Focused,
        value: 66,
    },
    TunerPreset {
        level: TunerLevel::HighSignal,
        value: 100,
    },
];

/// Markers within this distance of the slider are highlighted.
const PRESET_HIGHLIGHT_RADIUS: u8 = 17;

impl TunerPreset {
    pub fn sensitivity(&self) -> Sensitivity {
        Sensitivity::new(self.value)
    }

    pub fn is_near(&self, sensitivity: Sensitivity) -> bool {
        self.value.abs_diff(sensitivity.value()) < PRESET_HIGHLIGHT_RADIUS
    }
}

/// Headline numbers under the tuner. These are display estimates derived
/// from the slider alone, not measured from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    /// Percent of the feed filtered out.
    pub feed_filtered: u8,
    /// Average goal match of what remains.
    pub avg_match: u8,
}

impl FilterStats {
    pub fn for_sensitivity(sensitivity: Sensitivity) -> Self {
        let s = sensitivity.value() as f64;
        Self {
            feed_filtered: (100.0 - s * 0.7).round() as u8,
            avg_match: (s * 0.12 + 70.0).round() as u8,
        }
    }
}
