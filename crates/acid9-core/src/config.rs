//! Sequencer configuration, stored as TOML
//!
//! Every field has a default, so a partial file only overrides what it
//! names. Values are clamped when applied, never rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::euclidean::Distribution;
use crate::expression::{ExpressionSettings, ForceMode};
use crate::gear::MAX_STEPS;
use crate::logic::LogicMode;
use crate::scale::ScaleMode;

/// One logic-driven output: which mode fires it and how often
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicRoute {
    pub mode: LogicMode,
    pub probability: f32,
}

impl Default for LogicRoute {
    fn default() -> Self {
        Self::new(LogicMode::Always, 1.0)
    }
}

impl LogicRoute {
    pub fn new(mode: LogicMode, probability: f32) -> Self {
        Self { mode, probability }
    }

    pub fn probability(&self) -> f32 {
        self.probability.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicConfig {
    /// Semitone threshold for Leap and Step (1-12)
    pub threshold: i32,
    pub gate: LogicRoute,
    pub slide: LogicRoute,
    pub accent: LogicRoute,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            gate: LogicRoute::new(LogicMode::Always, 1.0),
            slide: LogicRoute::new(LogicMode::Leap, 0.5),
            accent: LogicRoute::new(LogicMode::Drop, 0.5),
        }
    }
}

impl LogicConfig {
    pub fn threshold(&self) -> i32 {
        self.threshold.clamp(1, 12)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterferenceConfig {
    /// Index into the gear B lengths 3, 5, 7, 9, 11, 13
    pub gear_b_length_index: usize,
    /// Phase offset for gear B reads (0-15)
    pub offset: usize,
    /// Root pitch class (0-11)
    pub root: i32,
    pub scale: ScaleMode,
}

impl Default for InterferenceConfig {
    fn default() -> Self {
        Self {
            gear_b_length_index: 2,
            offset: 0,
            root: 0,
            scale: ScaleMode::Major,
        }
    }
}

/// How expression-engine flags combine with the logic-driven ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionBlend {
    /// Logic only
    #[default]
    Off,
    /// Either source may slide or accent
    Or,
    /// Expression decides slide and accent alone
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    pub viscosity: f32,
    pub force_mode: ForceMode,
    pub force_depth: f32,
    pub blend: ExpressionBlend,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        let settings = ExpressionSettings::default();
        Self {
            viscosity: settings.viscosity,
            force_mode: settings.force_mode,
            force_depth: settings.force_depth,
            blend: ExpressionBlend::Off,
        }
    }
}

impl ExpressionConfig {
    pub fn settings(&self) -> ExpressionSettings {
        ExpressionSettings {
            viscosity: self.viscosity,
            force_mode: self.force_mode,
            force_depth: self.force_depth,
        }
    }
}

/// Euclidean gate gear (gear C)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EuclidConfig {
    /// When on, gates only pass on gear C hits
    pub enabled: bool,
    pub hits: usize,
    pub steps: usize,
    pub distribution: Distribution,
}

impl Default for EuclidConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hits: 4,
            steps: MAX_STEPS,
            distribution: Distribution::Legacy,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Seed for probability draws and mutation; random when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub logic: LogicConfig,
    pub interference: InterferenceConfig,
    pub expression: ExpressionConfig,
    pub euclid: EuclidConfig,
}

impl SequencerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_toml_str(&std::fs::read_to_string(path)?)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }
}
