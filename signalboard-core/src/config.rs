//! Per-mode trading configuration.
//!
//! A `TradingConfig` is an immutable value handed by reference to every
//! scoring call. Mutation (settings screens, remote sync) happens outside the
//! core; the core only ever reads a config.
//!
//! TOML documents may be partial: any missing key falls back to the mode
//! preset (`TradingConfig::swing()` / `TradingConfig::intraday()`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::Mode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config section [{section}] must be a table")]
    NotATable { section: String },

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiConfig {
    pub enabled: bool,
    pub period: usize,
    #[serde(alias = "ob")]
    pub overbought: f64,
    #[serde(alias = "os")]
    pub oversold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmaConfig {
    pub enabled: bool,
    pub fast_period: usize,
    pub slow_period: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupertrendConfig {
    pub enabled: bool,
    pub period: usize,
    #[serde(alias = "mult")]
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub enabled: bool,
    /// Averaging window for the volume ratio.
    pub period: usize,
    /// Ratio above which a bar counts as a spike.
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmaConfig {
    pub enabled: bool,
    pub periods: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub enabled: bool,
    pub bullish: bool,
    pub bearish: bool,
    pub neutral: bool,
}

/// Trade plan sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Target distance as a multiple of the stop distance (2.0 = 1:2).
    pub reward_multiple: f64,
}

/// Moving average that overextension is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceAverage {
    EmaSlow,
    Dma(u32),
}

/// Thresholds for the strategy classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyThresholds {
    /// Minimum rank that counts as "high confluence".
    pub high_confluence_rank: u8,
    /// Maximum percentage above a supporting DMA for a bounce setup.
    pub bounce_band_pct: f64,
    /// Shortest DMA period treated as long-period support.
    pub bounce_min_period: u32,
    /// Percentage distance from the reference average that counts as stretched.
    pub overextension_pct: f64,
    pub overextension_reference: ReferenceAverage,
}

/// Complete configuration for one trading mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    pub rsi: RsiConfig,
    pub ema: EmaConfig,
    pub supertrend: SupertrendConfig,
    pub volume: VolumeConfig,
    pub dma: DmaConfig,
    pub patterns: PatternConfig,
    pub plan: PlanConfig,
    pub strategy: StrategyThresholds,
}

impl TradingConfig {
    /// Swing preset (daily/weekly/monthly boards).
    pub fn swing() -> Self {
        Self {
            rsi: RsiConfig { enabled: true, period: 14, overbought: 70.0, oversold: 30.0 },
            ema: EmaConfig { enabled: true, fast_period: 9, slow_period: 20 },
            supertrend: SupertrendConfig { enabled: true, period: 10, multiplier: 3.0 },
            volume: VolumeConfig { enabled: true, period: 20, threshold: 2.0 },
            dma: DmaConfig { enabled: true, periods: vec![10, 20, 50, 200] },
            patterns: PatternConfig { enabled: true, bullish: true, bearish: true, neutral: false },
            plan: PlanConfig { reward_multiple: 2.0 },
            strategy: StrategyThresholds::default(),
        }
    }

    /// Intraday preset (5m..60m boards).
    pub fn intraday() -> Self {
        Self {
            rsi: RsiConfig { enabled: true, period: 14, overbought: 80.0, oversold: 20.0 },
            ema: EmaConfig { enabled: true, fast_period: 9, slow_period: 21 },
            supertrend: SupertrendConfig { enabled: true, period: 10, multiplier: 2.5 },
            volume: VolumeConfig { enabled: true, period: 20, threshold: 1.5 },
            dma: DmaConfig { enabled: false, periods: vec![10, 20] },
            patterns: PatternConfig { enabled: true, bullish: true, bearish: true, neutral: false },
            plan: PlanConfig { reward_multiple: 2.0 },
            strategy: StrategyThresholds::default(),
        }
    }

    pub fn preset(mode: Mode) -> Self {
        match mode {
            Mode::Swing => Self::swing(),
            Mode::Intraday => Self::intraday(),
        }
    }

    /// Parse a (possibly partial) TOML document over the preset for `mode`.
    pub fn from_toml_str(mode: Mode, content: &str) -> Result<Self, ConfigError> {
        let overlay: toml::Table = toml::from_str(content)?;
        Self::from_overlay(mode, overlay)
    }

    pub fn from_toml_file(mode: Mode, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(mode, &content)
    }

    fn from_overlay(mode: Mode, mut overlay: toml::Table) -> Result<Self, ConfigError> {
        normalize_short_keys(&mut overlay);
        let mut base = match toml::Value::try_from(Self::preset(mode)) {
            Ok(toml::Value::Table(table)) => table,
            Ok(_) => return Err(ConfigError::NotATable { section: mode.as_str().to_string() }),
            Err(e) => return Err(ConfigError::Invalid { field: "preset", reason: e.to_string() }),
        };
        merge_tables(&mut base, overlay);
        let config: Self = toml::Value::Table(base).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation.
    ///
    /// An enabled DMA module with an empty period list is accepted: it simply
    /// never contributes to the rank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid { field, reason: reason.into() }
        }

        if self.rsi.period == 0 {
            return Err(invalid("rsi.period", "must be >= 1"));
        }
        if !(0.0..=100.0).contains(&self.rsi.oversold) || !(0.0..=100.0).contains(&self.rsi.overbought) {
            return Err(invalid("rsi", "thresholds must lie in [0, 100]"));
        }
        if self.rsi.oversold >= self.rsi.overbought {
            return Err(invalid(
                "rsi",
                format!(
                    "oversold ({}) must be below overbought ({})",
                    self.rsi.oversold, self.rsi.overbought
                ),
            ));
        }
        if self.ema.fast_period == 0 || self.ema.slow_period == 0 {
            return Err(invalid("ema", "periods must be >= 1"));
        }
        if self.ema.fast_period >= self.ema.slow_period {
            return Err(invalid("ema", "fast_period must be shorter than slow_period"));
        }
        if self.supertrend.period == 0 {
            return Err(invalid("supertrend.period", "must be >= 1"));
        }
        if !(self.supertrend.multiplier > 0.0) {
            return Err(invalid("supertrend.multiplier", "must be > 0"));
        }
        if self.volume.period == 0 {
            return Err(invalid("volume.period", "must be >= 1"));
        }
        if !(self.volume.threshold > 0.0) {
            return Err(invalid("volume.threshold", "must be > 0"));
        }
        if self.dma.periods.contains(&0) {
            return Err(invalid("dma.periods", "periods must be >= 1"));
        }
        if !(self.plan.reward_multiple > 0.0) || !self.plan.reward_multiple.is_finite() {
            return Err(invalid("plan.reward_multiple", "must be a positive finite number"));
        }
        if !(self.strategy.bounce_band_pct >= 0.0) {
            return Err(invalid("strategy.bounce_band_pct", "must be >= 0"));
        }
        if !(self.strategy.overextension_pct >= 0.0) {
            return Err(invalid("strategy.overextension_pct", "must be >= 0"));
        }
        Ok(())
    }

    /// DMA periods that are active for scoring: empty when the module is off.
    pub fn active_dma_periods(&self) -> &[u32] {
        if self.dma.enabled {
            &self.dma.periods
        } else {
            &[]
        }
    }

    /// Deterministic BLAKE3 hash of the canonical JSON form.
    ///
    /// Two configs with identical parameters produce the same fingerprint,
    /// which lets exported reports be tied to the settings that produced them.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

impl Default for StrategyThresholds {
    fn default() -> Self {
        Self {
            high_confluence_rank: 3,
            bounce_band_pct: 1.5,
            bounce_min_period: 20,
            overextension_pct: 12.0,
            overextension_reference: ReferenceAverage::EmaSlow,
        }
    }
}

/// Configuration profiles for both modes, loaded from one TOML document with
/// optional `[swing]` and `[intraday]` tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigProfiles {
    pub swing: TradingConfig,
    pub intraday: TradingConfig,
}

impl Default for ConfigProfiles {
    fn default() -> Self {
        Self {
            swing: TradingConfig::swing(),
            intraday: TradingConfig::intraday(),
        }
    }
}

impl ConfigProfiles {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut doc: toml::Table = toml::from_str(content)?;
        let mut section = |mode: Mode| -> Result<TradingConfig, ConfigError> {
            match doc.remove(mode.as_str()) {
                Some(toml::Value::Table(table)) => TradingConfig::from_overlay(mode, table),
                Some(_) => Err(ConfigError::NotATable { section: mode.as_str().to_string() }),
                None => Ok(TradingConfig::preset(mode)),
            }
        };
        Ok(Self {
            swing: section(Mode::Swing)?,
            intraday: section(Mode::Intraday)?,
        })
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn get(&self, mode: Mode) -> &TradingConfig {
        match mode {
            Mode::Swing => &self.swing,
            Mode::Intraday => &self.intraday,
        }
    }
}

/// Rewrite the settings-screen short names (`ob`, `os`, `mult`) to the field
/// names, so an overlay key cannot collide with the preset key it replaces.
fn normalize_short_keys(overlay: &mut toml::Table) {
    const SHORT_KEYS: [(&str, &str, &str); 3] = [
        ("rsi", "ob", "overbought"),
        ("rsi", "os", "oversold"),
        ("supertrend", "mult", "multiplier"),
    ];
    for (section, short, long) in SHORT_KEYS {
        if let Some(toml::Value::Table(table)) = overlay.get_mut(section) {
            if let Some(value) = table.remove(short) {
                table.insert(long.to_string(), value);
            }
        }
    }
}

/// Recursively overlay `overlay` onto `base`; scalar and array values replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_inner)), toml::Value::Table(overlay_inner)) => {
                merge_tables(base_inner, overlay_inner);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
