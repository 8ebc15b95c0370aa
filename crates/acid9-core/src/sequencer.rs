//! Per-step orchestration of the interference engine and decision engines
//!
//! [`Acid9Sequencer::step`] is the one call a transport makes per clock
//! tick. Order matters: gears advance first, then the logic and expression
//! engines see the new values, then probability draws decide the outputs.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::{ExpressionBlend, LogicRoute, SequencerConfig};
use crate::error::Result;
use crate::expression::{ExpressionEngine, ExpressionSettings};
use crate::gear::{GearBuffer, GearKind, GearSnapshot, MAX_STEPS};
use crate::interference::{InterferenceEngine, InterferenceSnapshot};
use crate::logic::LogicEvaluator;

/// Decisions for one step, handed to the voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepOutput {
    /// Steps taken since the last reset, counting this one
    pub step: u64,
    /// Quantized pitch in semitones, before any external transposition
    pub pitch: i32,
    pub gate: bool,
    pub slide: bool,
    /// Only set on gated steps
    pub accent: bool,
}

impl Default for StepOutput {
    fn default() -> Self {
        Self {
            step: 0,
            pitch: GearKind::Pitch.default_value(),
            gate: false,
            slide: false,
            accent: false,
        }
    }
}

/// Persisted sequencer state. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<InterferenceSnapshot>,
    #[serde(rename = "gearC", default, skip_serializing_if = "Option::is_none")]
    pub gear_c: Option<GearSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<ExpressionSettings>,
}

pub struct Acid9Sequencer {
    engine: InterferenceEngine,
    logic: LogicEvaluator,
    expression: ExpressionEngine,
    /// Euclidean gate gear
    gear_c: GearBuffer,
    config: SequencerConfig,
    rng: fastrand::Rng,
    steps: u64,
    last: StepOutput,
}

impl Acid9Sequencer {
    /// Build a sequencer; the RNG is seeded from `config.seed` when present
    pub fn new(config: SequencerConfig) -> Self {
        let rng = config.seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        Self::with_rng(config, rng)
    }

    pub fn with_rng(config: SequencerConfig, rng: fastrand::Rng) -> Self {
        let mut gear_c = GearBuffer::new(MAX_STEPS, GearKind::Gate);
        gear_c.generate_with(config.euclid.hits, config.euclid.steps, config.euclid.distribution);

        let mut sequencer = Self {
            engine: InterferenceEngine::new(),
            logic: LogicEvaluator::new(),
            expression: ExpressionEngine::new(),
            gear_c,
            config: SequencerConfig::default(),
            rng,
            steps: 0,
            last: StepOutput::default(),
        };
        sequencer.apply_config(config);
        sequencer
    }

    /// Push configuration into the engines. Gear C is regenerated only when
    /// its pattern settings change, so a running pattern keeps its phase.
    pub fn apply_config(&mut self, config: SequencerConfig) {
        let interference = &config.interference;
        self.engine.set_gear_b_length_index(interference.gear_b_length_index);
        self.engine.set_offset(interference.offset);
        self.engine.set_root(interference.root);
        self.engine.set_scale(interference.scale);

        self.expression.apply_settings(&config.expression.settings());

        let euclid = &config.euclid;
        let old = &self.config.euclid;
        if (euclid.hits, euclid.steps, euclid.distribution) != (old.hits, old.steps, old.distribution) {
            self.gear_c.generate_with(euclid.hits, euclid.steps, euclid.distribution);
        }

        debug!(
            "Applied config: threshold {}, gate {}, slide {}, accent {}, scale {}",
            config.logic.threshold(),
            config.logic.gate.mode.name(),
            config.logic.slide.mode.name(),
            config.logic.accent.mode.name(),
            interference.scale.name()
        );
        self.config = config;
    }

    /// Advance one clock step and decide pitch, gate, slide and accent
    pub fn step(&mut self) -> StepOutput {
        self.engine.on_clock();
        self.gear_c.advance();

        self.logic.update(self.engine.context());
        let pitch = self.engine.quantized_pitch();
        self.expression.update(pitch, self.engine.prev_pitch());

        let draws = [self.rng.f32(), self.rng.f32(), self.rng.f32()];
        let routes = &self.config.logic;
        let mut gate = self.decide(routes.gate, draws[0]);
        let mut slide = self.decide(routes.slide, draws[1]);
        let mut accent = self.decide(routes.accent, draws[2]);

        match self.config.expression.blend {
            ExpressionBlend::Off => {}
            ExpressionBlend::Or => {
                slide |= self.expression.slide();
                accent |= self.expression.accent();
            }
            ExpressionBlend::Replace => {
                slide = self.expression.slide();
                accent = self.expression.accent();
            }
        }

        if self.config.euclid.enabled {
            gate &= self.gear_c.gate();
        }
        accent &= gate;

        self.steps += 1;
        self.last = StepOutput {
            step: self.steps,
            pitch,
            gate,
            slide,
            accent,
        };
        trace!(
            step = self.steps,
            pitch,
            gate,
            slide,
            accent,
            interval = self.logic.interval(),
            "step"
        );
        self.last
    }

    fn decide(&self, route: LogicRoute, draw: f32) -> bool {
        self.logic.evaluate_with_probability(
            route.mode,
            self.config.logic.threshold(),
            route.probability(),
            draw,
        )
    }

    /// Rewind every gear and clear all history; configuration is kept
    pub fn reset(&mut self) {
        self.engine.reset();
        self.logic.reset();
        self.expression.reset();
        self.gear_c.reset();
        self.steps = 0;
        self.last = StepOutput::default();
        debug!("Sequencer reset");
    }

    /// Randomize gear A
    pub fn mutate_a(&mut self) {
        self.engine.mutate_gear_a(&mut self.rng);
        debug!("Mutated gear A");
    }

    /// Randomize gear B
    pub fn mutate_b(&mut self) {
        self.engine.mutate_gear_b(&mut self.rng);
        debug!("Mutated gear B");
    }

    /// Trigger-driven gear B randomization
    pub fn inject(&mut self) {
        self.mutate_b();
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.engine.set_frozen(frozen);
    }

    pub fn engine(&self) -> &InterferenceEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut InterferenceEngine {
        &mut self.engine
    }

    pub fn logic(&self) -> &LogicEvaluator {
        &self.logic
    }

    pub fn expression(&self) -> &ExpressionEngine {
        &self.expression
    }

    pub fn gear_c(&self) -> &GearBuffer {
        &self.gear_c
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn last_output(&self) -> StepOutput {
        self.last
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn state(&self) -> SequencerState {
        SequencerState {
            engine: Some(self.engine.snapshot()),
            gear_c: Some(self.gear_c.snapshot()),
            expression: Some(self.expression.settings()),
        }
    }

    pub fn restore_state(&mut self, state: &SequencerState) {
        if let Some(engine) = &state.engine {
            self.engine.restore(engine);
        }
        if let Some(gear_c) = &state.gear_c {
            self.gear_c.restore(gear_c);
        }
        if let Some(settings) = &state.expression {
            self.expression.apply_settings(settings);
        }
    }

    pub fn save_state(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.state())?)
    }

    pub fn load_state(&mut self, json: &str) -> Result<()> {
        let state: SequencerState = serde_json::from_str(json)?;
        self.restore_state(&state);
        Ok(())
    }
}
