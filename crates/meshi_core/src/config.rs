use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MeshiConfig {
    pub feed: FeedConfig,
    pub dispatch: DispatchConfig,
    pub focus: FocusConfig,
    pub ledger: LedgerConfig,
    /// Seed for every random draw in the session. `None` = entropy.
    pub seed: Option<u64>,
}

impl MeshiConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied and ranges are checked.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: MeshiConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Try to load from path; if the file is missing or invalid, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                if let Err(e) = cfg.validate() {
                    tracing::warn!("Ignoring invalid env overrides ({})", e);
                    return Self::default();
                }
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MESHI_SENSITIVITY") {
            if let Ok(n) = v.parse() {
                self.feed.initial_sensitivity = n;
            }
        }
        if let Ok(v) = std::env::var("MESHI_SEED") {
            if let Ok(n) = v.parse() {
                self.seed = Some(n);
            }
        }
        if let Ok(v) = std::env::var("MESHI_SUCCESS_PROBABILITY") {
            if let Ok(n) = v.parse() {
                self.dispatch.success_probability = n;
            }
        }
        if let Ok(v) = std::env::var("MESHI_INSTANT") {
            if v == "1" || v.eq_ignore_ascii_case("true") {
                self.dispatch = self.dispatch.clone().instant();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed.initial_sensitivity > 100 {
            bail!(
                "feed.initial_sensitivity must be within 0-100, got {}",
                self.feed.initial_sensitivity
            );
        }
        if !(0.0..=1.0).contains(&self.dispatch.success_probability) {
            bail!(
                "dispatch.success_probability must be within 0.0-1.0, got {}",
                self.dispatch.success_probability
            );
        }
        if self.focus.initial > self.focus.capacity {
            bail!(
                "focus.initial ({}) exceeds focus.capacity ({})",
                self.focus.initial,
                self.focus.capacity
            );
        }
        if self.ledger.capacity == 0 {
            bail!("ledger.capacity must be at least 1");
        }
        Ok(())
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Starting position of the signal tuner, 0-100.
    pub initial_sensitivity: u8,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            initial_sensitivity: 50,
        }
    }
}

/// Handshake timing and outcome odds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub sync_delay_ms: u64,
    pub check_delay_ms: u64,
    pub verify_delay_ms: u64,
    pub success_probability: f64,
    pub failure_reason: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sync_delay_ms: 1200,
            check_delay_ms: 1000,
            verify_delay_ms: 1500,
            success_probability: 0.7,
            failure_reason: "Your profile lacks 'Audio Samples'. Upload samples to retry."
                .to_string(),
        }
    }
}

impl DispatchConfig {
    /// Same odds, zero latency.
    pub fn instant(self) -> Self {
        Self {
            sync_delay_ms: 0,
            check_delay_ms: 0,
            verify_delay_ms: 0,
            ..self
        }
    }

    pub fn sync_delay(&self) -> Duration {
        Duration::from_millis(self.sync_delay_ms)
    }

    pub fn check_delay(&self) -> Duration {
        Duration::from_millis(self.check_delay_ms)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }

    /// Time from acceptance to outcome.
    pub fn total_latency(&self) -> Duration {
        self.sync_delay() + self.check_delay() + self.verify_delay()
    }
}

/// Focus points: the per-session dispatch budget ("renews daily").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub capacity: u32,
    pub initial: u32,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            capacity: 15,
            initial: 12,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Newest entries kept; older ones fall off.
    pub capacity: usize,
    pub initial_burst: usize,
    pub burst_spacing_ms: u64,
    pub min_interval_ms: u64,
    pub interval_jitter_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            initial_burst: 8,
            burst_spacing_ms: 100,
            min_interval_ms: 800,
            interval_jitter_ms: 1200,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = MeshiConfig::default();
        assert_eq!(cfg.feed.initial_sensitivity, 50);
        assert_eq!(cfg.focus.capacity, 15);
        assert_eq!(cfg.focus.initial, 12);
        assert_eq!(cfg.dispatch.total_latency(), Duration::from_millis(3700));
        assert!((cfg.dispatch.success_probability - 0.7).abs() < f64::EPSILON);
        assert_eq!(cfg.ledger.capacity, 50);
        assert!(cfg.seed.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
seed = 42

[dispatch]
success_probability = 1.0
"#;
        let cfg: MeshiConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.dispatch.success_probability, 1.0);
        // Defaults for unspecified fields
        assert_eq!(cfg.dispatch.sync_delay_ms, 1200);
        assert_eq!(cfg.feed.initial_sensitivity, 50);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[feed]
initial_sensitivity = 10

[dispatch]
sync_delay_ms = 10
check_delay_ms = 20
verify_delay_ms = 30
success_probability = 0.5
failure_reason = "Calendar full"

[focus]
capacity = 5
initial = 5

[ledger]
capacity = 10
initial_burst = 2
burst_spacing_ms = 1
min_interval_ms = 5
interval_jitter_ms = 0
"#;
        let cfg: MeshiConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.feed.initial_sensitivity, 10);
        assert_eq!(cfg.dispatch.total_latency(), Duration::from_millis(60));
        assert_eq!(cfg.dispatch.failure_reason, "Calendar full");
        assert_eq!(cfg.focus.capacity, 5);
        assert_eq!(cfg.ledger.initial_burst, 2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut cfg = MeshiConfig::default();
        cfg.feed.initial_sensitivity = 101;
        assert!(cfg.validate().is_err());

        let mut cfg = MeshiConfig::default();
        cfg.dispatch.success_probability = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = MeshiConfig::default();
        cfg.focus.initial = 16;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_instant_keeps_odds() {
        let cfg = DispatchConfig::default().instant();
        assert_eq!(cfg.total_latency(), Duration::ZERO);
        assert_eq!(cfg.success_probability, 0.7);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let cfg = MeshiConfig::load_or_default("/tmp/nonexistent_meshi_config_12345.toml");
        assert_eq!(cfg.focus.capacity, 15);
    }
}
