//! Musical logic conditions for Gate/Slide/Accent routing
//!
//! The evaluator keeps only the last context it was fed. Each
//! [`LogicMode`] is a pure predicate over that context.

use serde::{Deserialize, Serialize};

/// Master list of logic modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicMode {
    /// Every step
    #[default]
    Always,
    Never,
    /// Pitch differs from the previous step
    Change,
    Same,
    Rise,
    Drop,
    /// Interval larger than the threshold
    Leap,
    /// Non-zero interval up to the threshold
    Step,
    /// Fires one step after a local maximum: falling now, rising before
    Peak,
    /// Fires one step after a local minimum: rising now, falling before
    Valley,
    Third,
    Fifth,
    Octave,
    BPos,
    BNeg,
    BZero,
    /// Gears A and B moving the same way, or both still
    Agree,
    /// Gears A and B moving in opposite directions
    Clash,
}

impl LogicMode {
    pub const ALL: [LogicMode; 18] = [
        Self::Always,
        Self::Never,
        Self::Change,
        Self::Same,
        Self::Rise,
        Self::Drop,
        Self::Leap,
        Self::Step,
        Self::Peak,
        Self::Valley,
        Self::Third,
        Self::Fifth,
        Self::Octave,
        Self::BPos,
        Self::BNeg,
        Self::BZero,
        Self::Agree,
        Self::Clash,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Mode for a switch position; `None` outside `0..18`
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Always => "Always",
            Self::Never => "Never",
            Self::Change => "Change",
            Self::Same => "Same",
            Self::Rise => "Rise",
            Self::Drop => "Drop",
            Self::Leap => "Leap",
            Self::Step => "Step",
            Self::Peak => "Peak",
            Self::Valley => "Valley",
            Self::Third => "3rd",
            Self::Fifth => "5th",
            Self::Octave => "Oct",
            Self::BPos => "B+",
            Self::BNeg => "B-",
            Self::BZero => "B=0",
            Self::Agree => "Agree",
            Self::Clash => "Clash",
        }
    }
}

/// Snapshot of the melodic state for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicContext {
    pub current_pitch: i32,
    pub prev_pitch: i32,
    pub prev_prev_pitch: i32,
    pub gear_a_value: i32,
    pub prev_gear_a_value: i32,
    pub gear_b_offset: i32,
    pub prev_gear_b_offset: i32,
}

impl Default for LogicContext {
    fn default() -> Self {
        Self {
            current_pitch: 12,
            prev_pitch: 12,
            prev_prev_pitch: 12,
            gear_a_value: 12,
            prev_gear_a_value: 12,
            gear_b_offset: 0,
            prev_gear_b_offset: 0,
        }
    }
}

impl LogicContext {
    /// Context carrying only a pitch triplet; gear values sit at rest
    pub fn from_pitches(current: i32, prev: i32, prev_prev: i32) -> Self {
        Self {
            current_pitch: current,
            prev_pitch: prev,
            prev_prev_pitch: prev_prev,
            ..Default::default()
        }
    }
}

/// Evaluates logic modes against the most recent context
#[derive(Debug, Clone, Default)]
pub struct LogicEvaluator {
    context: LogicContext,
    interval: i32,
    abs_interval: i32,
    gear_a_delta: i32,
    gear_b_delta: i32,
}

impl LogicEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the context for this step
    pub fn update(&mut self, context: LogicContext) {
        self.context = context;
        self.interval = context.current_pitch - context.prev_pitch;
        self.abs_interval = self.interval.abs();
        self.gear_a_delta = context.gear_a_value - context.prev_gear_a_value;
        self.gear_b_delta = context.gear_b_offset - context.prev_gear_b_offset;
    }

    /// Evaluate `mode`. `threshold` is only read by Leap and Step and is not
    /// validated.
    pub fn evaluate(&self, mode: LogicMode, threshold: i32) -> bool {
        let ctx = &self.context;
        match mode {
            LogicMode::Always => true,
            LogicMode::Never => false,
            LogicMode::Change => ctx.current_pitch != ctx.prev_pitch,
            LogicMode::Same => ctx.current_pitch == ctx.prev_pitch,
            LogicMode::Rise => self.interval > 0,
            LogicMode::Drop => self.interval < 0,
            LogicMode::Leap => self.abs_interval > threshold,
            LogicMode::Step => self.abs_interval > 0 && self.abs_interval <= threshold,
            LogicMode::Peak => {
                ctx.current_pitch < ctx.prev_pitch && ctx.prev_pitch > ctx.prev_prev_pitch
            }
            LogicMode::Valley => {
                ctx.current_pitch > ctx.prev_pitch && ctx.prev_pitch < ctx.prev_prev_pitch
            }
            LogicMode::Third => matches!(self.abs_interval, 3 | 4),
            LogicMode::Fifth => self.abs_interval == 7,
            LogicMode::Octave => self.abs_interval == 12,
            LogicMode::BPos => ctx.gear_b_offset > 0,
            LogicMode::BNeg => ctx.gear_b_offset < 0,
            LogicMode::BZero => ctx.gear_b_offset == 0,
            LogicMode::Agree => self.gear_a_delta.signum() == self.gear_b_delta.signum(),
            // A still gear never clashes
            LogicMode::Clash => self.gear_a_delta.signum() * self.gear_b_delta.signum() < 0,
        }
    }

    /// Evaluate by switch position; out-of-range indices are false
    pub fn evaluate_index(&self, index: i32, threshold: i32) -> bool {
        LogicMode::from_index(index).is_some_and(|mode| self.evaluate(mode, threshold))
    }

    /// Evaluate `mode` and let it through only when `draw < probability`
    pub fn evaluate_with_probability(
        &self,
        mode: LogicMode,
        threshold: i32,
        probability: f32,
        draw: f32,
    ) -> bool {
        self.evaluate(mode, threshold) && draw < probability
    }

    pub fn evaluate_index_with_probability(
        &self,
        index: i32,
        threshold: i32,
        probability: f32,
        draw: f32,
    ) -> bool {
        LogicMode::from_index(index)
            .is_some_and(|mode| self.evaluate_with_probability(mode, threshold, probability, draw))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn context(&self) -> &LogicContext {
        &self.context
    }

    pub fn interval(&self) -> i32 {
        self.interval
    }

    pub fn abs_interval(&self) -> i32 {
        self.abs_interval
    }
}
