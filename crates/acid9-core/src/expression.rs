//! Slide and accent derived from melodic context
//!
//! Viscosity (bipolar, -1..=1) picks which intervals slide:
//! - Liquid (negative): small intervals, up to 2..5 semitones
//! - Elastic (positive): large intervals, from 7 down to 3 semitones
//! - within 0.1 of center: never
//!
//! Force picks which notes accent: falling notes (Gravity), the highest note
//! of the recent window (Apex), or direction reversals (Inflection). Force
//! depth loosens each rule as it goes from 0 to 1.

use serde::{Deserialize, Serialize};

use crate::gear::GearKind;

/// Number of pitches kept for Apex and Inflection
pub const PITCH_HISTORY_SIZE: usize = 4;

const VISCOSITY_DEAD_ZONE: f32 = 0.1;

/// Accent strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceMode {
    /// Accent on pitch drops
    #[default]
    Gravity,
    /// Accent the highest note in the window
    Apex,
    /// Accent direction changes
    Inflection,
}

impl ForceMode {
    /// Mode for a switch position; unknown positions fall back to Gravity
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => Self::Apex,
            2 => Self::Inflection,
            _ => Self::Gravity,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gravity => "Gravity",
            Self::Apex => "Apex",
            Self::Inflection => "Inflection",
        }
    }
}

/// Persistable expression configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionSettings {
    pub viscosity: f32,
    pub force_mode: ForceMode,
    pub force_depth: f32,
}

impl Default for ExpressionSettings {
    fn default() -> Self {
        Self {
            viscosity: 0.0,
            force_mode: ForceMode::Gravity,
            force_depth: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpressionEngine {
    viscosity: f32,
    force_mode: ForceMode,
    force_depth: f32,
    slide: bool,
    accent: bool,
    history: [i32; PITCH_HISTORY_SIZE],
    /// Next slot to write
    history_index: usize,
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        let settings = ExpressionSettings::default();
        Self {
            viscosity: settings.viscosity,
            force_mode: settings.force_mode,
            force_depth: settings.force_depth,
            slide: false,
            accent: false,
            history: [GearKind::Pitch.default_value(); PITCH_HISTORY_SIZE],
            history_index: 0,
        }
    }
}

impl ExpressionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `current` into the history and recompute slide and accent.
    /// Call once per step.
    pub fn update(&mut self, current: i32, previous: i32) {
        self.history[self.history_index] = current;
        self.history_index = (self.history_index + 1) % PITCH_HISTORY_SIZE;

        self.slide = self.calculate_slide((current - previous).abs());
        self.accent = match self.force_mode {
            ForceMode::Gravity => self.gravity_accent(current, previous),
            ForceMode::Apex => self.apex_accent(current),
            ForceMode::Inflection => self.inflection_accent(current, previous),
        };
    }

    /// Pitch pushed `steps` updates ago; 0 is the most recent
    pub fn pitch_ago(&self, steps: usize) -> i32 {
        let steps = steps % PITCH_HISTORY_SIZE;
        self.history[(self.history_index + PITCH_HISTORY_SIZE - 1 - steps) % PITCH_HISTORY_SIZE]
    }

    /// Non-finite input falls back to the default
    pub fn set_viscosity(&mut self, viscosity: f32) {
        let viscosity = finite_or(viscosity, ExpressionSettings::default().viscosity);
        self.viscosity = viscosity.clamp(-1.0, 1.0);
    }

    pub fn set_force_mode(&mut self, mode: ForceMode) {
        self.force_mode = mode;
    }

    pub fn set_force_mode_index(&mut self, index: i32) {
        self.force_mode = ForceMode::from_index(index);
    }

    /// Non-finite input falls back to the default
    pub fn set_force_depth(&mut self, depth: f32) {
        let depth = finite_or(depth, ExpressionSettings::default().force_depth);
        self.force_depth = depth.clamp(0.0, 1.0);
    }

    pub fn viscosity(&self) -> f32 {
        self.viscosity
    }

    pub fn force_mode(&self) -> ForceMode {
        self.force_mode
    }

    pub fn force_depth(&self) -> f32 {
        self.force_depth
    }

    pub fn slide(&self) -> bool {
        self.slide
    }

    pub fn accent(&self) -> bool {
        self.accent
    }

    pub fn settings(&self) -> ExpressionSettings {
        ExpressionSettings {
            viscosity: self.viscosity,
            force_mode: self.force_mode,
            force_depth: self.force_depth,
        }
    }

    /// Apply persisted settings through the clamping setters
    pub fn apply_settings(&mut self, settings: &ExpressionSettings) {
        self.set_viscosity(settings.viscosity);
        self.set_force_mode(settings.force_mode);
        self.set_force_depth(settings.force_depth);
    }

    /// Clear history and outputs; settings are kept
    pub fn reset(&mut self) {
        self.history = [GearKind::Pitch.default_value(); PITCH_HISTORY_SIZE];
        self.history_index = 0;
        self.slide = false;
        self.accent = false;
    }

    fn calculate_slide(&self, interval: i32) -> bool {
        if self.viscosity.abs() < VISCOSITY_DEAD_ZONE {
            return false;
        }

        if self.viscosity < 0.0 {
            let threshold = (2.0 + self.viscosity.abs() * 3.0) as i32;
            interval > 0 && interval <= threshold
        } else {
            let threshold = (7.0 - self.viscosity * 4.0) as i32;
            interval >= threshold
        }
    }

    fn gravity_accent(&self, current: i32, previous: i32) -> bool {
        let drop = previous - current;
        if drop <= 0 {
            return false;
        }

        let min_drop = ((1.0 - self.force_depth) * 7.0) as i32;
        drop >= min_drop
    }

    /// History already holds `current`
    fn apex_accent(&self, current: i32) -> bool {
        let max = self.history.iter().copied().fold(current, i32::max);
        if current < max {
            return false;
        }

        if self.force_depth < 1.0 {
            let avg = self.history.iter().sum::<i32>() as f32 / PITCH_HISTORY_SIZE as f32;
            let margin = (1.0 - self.force_depth) * 5.0;
            return current as f32 >= avg + margin;
        }

        true
    }

    fn inflection_accent(&self, current: i32, previous: i32) -> bool {
        let two_ago = self.pitch_ago(2);
        let prev_direction = previous - two_ago;
        let curr_direction = current - previous;

        if prev_direction.signum() * curr_direction.signum() >= 0 {
            return false;
        }

        let total_change = prev_direction.abs() + curr_direction.abs();
        let min_change = ((1.0 - self.force_depth) * 6.0) as i32;
        total_change >= min_change
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(viscosity: f32, mode: ForceMode, depth: f32) -> ExpressionEngine {
        let mut engine = ExpressionEngine::new();
        engine.set_viscosity(viscosity);
        engine.set_force_mode(mode);
        engine.set_force_depth(depth);
        engine
    }

    #[test]
    fn test_dead_zone_never_slides() {
        let mut e = engine(0.05, ForceMode::Gravity, 0.5);
        for interval in 0..=24 {
            e.update(interval, 0);
            assert!(!e.slide(), "interval {interval}");
        }
        let mut e = engine(-0.09, ForceMode::Gravity, 0.5);
        e.update(1, 0);
        assert!(!e.slide());
    }

    #[test]
    fn test_liquid_slides_on_small_intervals() {
        let mut e = engine(-1.0, ForceMode::Gravity, 0.5);
        e.update(17, 12);
        assert!(e.slide(), "interval 5 is within threshold 5");
        e.update(18, 12);
        assert!(!e.slide(), "interval 6 is over threshold 5");
        e.update(12, 12);
        assert!(!e.slide(), "repeated note never slides");

        let mut e = engine(-0.2, ForceMode::Gravity, 0.5);
        e.update(14, 12);
        assert!(e.slide());
        e.update(17, 14);
        assert!(!e.slide(), "threshold is 2 near center");
    }

    #[test]
    fn test_elastic_slides_on_large_intervals() {
        let mut e = engine(0.2, ForceMode::Gravity, 0.5);
        e.update(17, 12);
        assert!(!e.slide(), "threshold is 6 at 0.2");
        e.update(24, 18);
        assert!(e.slide());

        let mut e = engine(1.0, ForceMode::Gravity, 0.5);
        e.update(15, 12);
        assert!(e.slide(), "threshold drops to 3");
        e.update(17, 15);
        assert!(!e.slide());
    }

    #[test]
    fn test_gravity_depth_sets_minimum_drop() {
        let mut loose = engine(0.0, ForceMode::Gravity, 1.0);
        loose.update(11, 12);
        assert!(loose.accent(), "any drop accents at full depth");
        loose.update(13, 12);
        assert!(!loose.accent(), "rises never accent");

        let mut strict = engine(0.0, ForceMode::Gravity, 0.0);
        strict.update(6, 12);
        assert!(!strict.accent());
        strict.update(5, 12);
        assert!(strict.accent(), "a drop of 7 is enough");
    }

    #[test]
    fn test_apex_accents_window_maximum() {
        let mut e = engine(0.0, ForceMode::Apex, 1.0);
        e.update(20, 12);
        assert!(e.accent());
        e.update(13, 20);
        assert!(!e.accent(), "20 is still in the window");
        e.update(20, 13);
        assert!(e.accent(), "ties with the window maximum count");
    }

    #[test]
    fn test_apex_depth_requires_margin_over_average() {
        let mut e = engine(0.0, ForceMode::Apex, 0.0);
        // Window 20, 12, 12, 12: average 14, needs 19
        e.update(20, 12);
        assert!(e.accent());

        let mut e = engine(0.0, ForceMode::Apex, 0.0);
        // Window 15, 12, 12, 12: average 12.75, needs 17.75
        e.update(15, 12);
        assert!(!e.accent());
    }

    #[test]
    fn test_inflection_on_direction_reversal() {
        let mut e = engine(0.0, ForceMode::Inflection, 0.5);
        e.update(16, 12);
        assert!(!e.accent(), "12 -> 12 -> 16 has no reversal");
        e.update(10, 16);
        assert!(e.accent(), "12 -> 16 -> 10 turns down");
        e.update(8, 10);
        assert!(!e.accent(), "still falling");
        e.update(9, 8);
        assert!(e.accent(), "a turn of 2 + 1 meets the minimum of 3");
    }

    #[test]
    fn test_inflection_depth_scales_minimum_change() {
        let mut strict = engine(0.0, ForceMode::Inflection, 0.0);
        strict.update(14, 12);
        strict.update(11, 14);
        assert!(!strict.accent(), "2 + 3 is under 6");
        strict.update(13, 11);
        assert!(!strict.accent(), "3 + 2 is under 6");
        strict.update(9, 13);
        assert!(strict.accent(), "2 + 4 reaches 6");
    }

    #[test]
    fn test_history_ring_lookup() {
        let mut e = ExpressionEngine::new();
        for pitch in [1, 2, 3, 4, 5] {
            e.update(pitch, pitch - 1);
        }
        assert_eq!(e.pitch_ago(0), 5);
        assert_eq!(e.pitch_ago(1), 4);
        assert_eq!(e.pitch_ago(2), 3);
        assert_eq!(e.pitch_ago(3), 2);
    }

    #[test]
    fn test_setters_clamp() {
        let mut e = ExpressionEngine::new();
        e.set_viscosity(-3.0);
        e.set_force_depth(2.0);
        assert_eq!(e.viscosity(), -1.0);
        assert_eq!(e.force_depth(), 1.0);
        e.set_force_mode_index(2);
        assert_eq!(e.force_mode(), ForceMode::Inflection);
        e.set_force_mode_index(9);
        assert_eq!(e.force_mode(), ForceMode::Gravity);
    }

    #[test]
    fn test_non_finite_settings_fall_back_to_defaults() {
        let mut e = engine(-1.0, ForceMode::Gravity, 1.0);
        e.set_viscosity(f32::NAN);
        e.set_force_depth(f32::NAN);
        assert_eq!(e.viscosity(), 0.0);
        assert_eq!(e.force_depth(), 0.5);

        e.update(12, 12);
        assert!(!e.slide(), "repeated note inside the dead zone");

        e.set_viscosity(f32::INFINITY);
        e.set_force_depth(f32::NEG_INFINITY);
        assert_eq!(e.viscosity(), 0.0);
        assert_eq!(e.force_depth(), 0.5);
    }

    #[test]
    fn test_reset_clears_outputs_but_keeps_settings() {
        let mut e = engine(-1.0, ForceMode::Gravity, 1.0);
        e.update(10, 12);
        assert!(e.slide() && e.accent());

        e.reset();
        assert!(!e.slide() && !e.accent());
        assert_eq!(e.pitch_ago(0), 12);
        assert_eq!(e.settings().viscosity, -1.0);
    }

    #[test]
    fn test_settings_round_trip_through_clamps() {
        let mut e = ExpressionEngine::new();
        e.apply_settings(&ExpressionSettings {
            viscosity: 4.0,
            force_mode: ForceMode::Apex,
            force_depth: -1.0,
        });
        let s = e.settings();
        assert_eq!(s.viscosity, 1.0);
        assert_eq!(s.force_mode, ForceMode::Apex);
        assert_eq!(s.force_depth, 0.0);
    }
}
