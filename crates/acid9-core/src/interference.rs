//! Two-gear interference melody
//!
//! Gear A is a 16-step pitch riff, gear B a shorter offset loop. Because the
//! lengths differ, the sum `A[i] + B[j]` drifts against itself and the
//! melody only repeats after the least common multiple of the two lengths.
//! The sum is then quantized to the active scale.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::gear::{GearBuffer, GearKind, GearSnapshot, MAX_STEPS};
use crate::logic::LogicContext;
use crate::scale::{ScaleMask, ScaleMode, quantize};

/// Gear B lengths selectable by index; odd so they rarely line up with A
pub const GEAR_B_LENGTHS: [usize; 6] = [3, 5, 7, 9, 11, 13];

const DEFAULT_GEAR_B_LENGTH_INDEX: usize = 2;

/// C E G E C E A G / D F A F D F G F, one octave up
const DEFAULT_RIFF: [i32; MAX_STEPS] = [0, 4, 7, 4, 0, 4, 9, 7, 2, 5, 9, 5, 2, 5, 7, 5];
const DEFAULT_OFFSETS: [i32; 7] = [0, 0, 2, -2, 0, 3, 0];

/// Persisted form of the engine. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterferenceSnapshot {
    #[serde(rename = "gearA", default, skip_serializing_if = "Option::is_none")]
    pub gear_a: Option<GearSnapshot>,
    #[serde(rename = "gearB", default, skip_serializing_if = "Option::is_none")]
    pub gear_b: Option<GearSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct InterferenceEngine {
    gear_a: GearBuffer,
    gear_b: GearBuffer,
    /// Phase offset applied when reading gear B
    offset: usize,
    frozen: bool,
    root: i32,
    scale: ScaleMode,
    scale_mask: ScaleMask,
    use_scale_bus: bool,
    quantized_pitch: i32,
    prev_pitch: i32,
    prev_prev_pitch: i32,
    prev_gear_a_value: i32,
    prev_gear_b_offset: i32,
}

impl Default for InterferenceEngine {
    fn default() -> Self {
        let mut gear_a = GearBuffer::new(MAX_STEPS, GearKind::Pitch);
        for (step, &note) in DEFAULT_RIFF.iter().enumerate() {
            gear_a.set_value_at(step, note + 12);
        }

        let mut gear_b = GearBuffer::new(GEAR_B_LENGTHS[DEFAULT_GEAR_B_LENGTH_INDEX], GearKind::Offset);
        for (step, &offset) in DEFAULT_OFFSETS.iter().enumerate() {
            gear_b.set_value_at(step, offset);
        }

        let rest = GearKind::Pitch.default_value();
        Self {
            gear_a,
            gear_b,
            offset: 0,
            frozen: false,
            root: 0,
            scale: ScaleMode::default(),
            scale_mask: ScaleMode::default().mask(),
            use_scale_bus: false,
            quantized_pitch: rest,
            prev_pitch: rest,
            prev_prev_pitch: rest,
            prev_gear_a_value: rest,
            prev_gear_b_offset: GearKind::Offset.default_value(),
        }
    }
}

impl InterferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one step and recompute the quantized pitch
    pub fn on_clock(&mut self) {
        self.prev_gear_a_value = self.gear_a.pitch();
        self.prev_gear_b_offset = self.current_gear_b_offset();

        self.gear_a.advance();
        if !self.frozen {
            self.gear_b.advance();
        }

        self.prev_prev_pitch = self.prev_pitch;
        self.prev_pitch = self.quantized_pitch;
        self.quantized_pitch = quantize(self.raw_pitch(), self.root, self.scale_mask);
    }

    /// Rewind both gears and forget the pitch history
    pub fn reset(&mut self) {
        self.gear_a.reset();
        self.gear_b.reset();
        let rest = GearKind::Pitch.default_value();
        self.quantized_pitch = rest;
        self.prev_pitch = rest;
        self.prev_prev_pitch = rest;
        self.prev_gear_a_value = rest;
        self.prev_gear_b_offset = GearKind::Offset.default_value();
    }

    /// Gear A plus gear B before quantization
    pub fn raw_pitch(&self) -> i32 {
        self.gear_a.pitch() + self.current_gear_b_offset()
    }

    pub fn quantized_pitch(&self) -> i32 {
        self.quantized_pitch
    }

    pub fn prev_pitch(&self) -> i32 {
        self.prev_pitch
    }

    pub fn prev_prev_pitch(&self) -> i32 {
        self.prev_prev_pitch
    }

    pub fn gear_a_value(&self) -> i32 {
        self.gear_a.pitch()
    }

    pub fn prev_gear_a_value(&self) -> i32 {
        self.prev_gear_a_value
    }

    /// Gear B value at its playhead shifted by the phase offset
    pub fn current_gear_b_offset(&self) -> i32 {
        self.gear_b.value_at(self.gear_b.position() + self.offset)
    }

    pub fn prev_gear_b_offset(&self) -> i32 {
        self.prev_gear_b_offset
    }

    /// Logic context for the step just clocked
    pub fn context(&self) -> LogicContext {
        LogicContext {
            current_pitch: self.quantized_pitch,
            prev_pitch: self.prev_pitch,
            prev_prev_pitch: self.prev_prev_pitch,
            gear_a_value: self.gear_a_value(),
            prev_gear_a_value: self.prev_gear_a_value,
            gear_b_offset: self.current_gear_b_offset(),
            prev_gear_b_offset: self.prev_gear_b_offset,
        }
    }

    /// Pick gear B's length from [`GEAR_B_LENGTHS`]; the index is clamped
    pub fn set_gear_b_length_index(&mut self, index: usize) {
        let index = index.min(GEAR_B_LENGTHS.len() - 1);
        self.gear_b.set_length(GEAR_B_LENGTHS[index]);
    }

    pub fn gear_b_length(&self) -> usize {
        self.gear_b.len()
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset % MAX_STEPS;
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Hold gear B in place while gear A keeps turning
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_root(&mut self, root: i32) {
        self.root = root.clamp(0, 11);
    }

    pub fn root(&self) -> i32 {
        self.root
    }

    /// Select a scale. Ignored for quantization while a scale bus is driving
    /// the mask.
    pub fn set_scale(&mut self, scale: ScaleMode) {
        self.scale = scale;
        if !self.use_scale_bus {
            self.scale_mask = scale.mask();
        }
    }

    pub fn scale(&self) -> ScaleMode {
        self.scale
    }

    pub fn scale_mask(&self) -> ScaleMask {
        self.scale_mask
    }

    pub fn is_using_scale_bus(&self) -> bool {
        self.use_scale_bus
    }

    /// Take mask and root from a polyphonic scale bus. Fewer than 12
    /// channels drops back to the selected scale.
    pub fn update_from_scale_bus(&mut self, voltages: &[f32]) {
        match ScaleMask::from_bus(voltages) {
            Some((mask, root)) => {
                self.use_scale_bus = true;
                self.scale_mask = mask;
                if let Some(root) = root {
                    self.root = root;
                }
            }
            None => {
                self.use_scale_bus = false;
                self.scale_mask = self.scale.mask();
            }
        }
    }

    pub fn mutate_gear_a(&mut self, rng: &mut fastrand::Rng) {
        self.gear_a.randomize(rng);
    }

    pub fn mutate_gear_b(&mut self, rng: &mut fastrand::Rng) {
        self.gear_b.randomize(rng);
    }

    pub fn gear_a(&self) -> &GearBuffer {
        &self.gear_a
    }

    pub fn gear_a_mut(&mut self) -> &mut GearBuffer {
        &mut self.gear_a
    }

    pub fn gear_b(&self) -> &GearBuffer {
        &self.gear_b
    }

    pub fn gear_b_mut(&mut self) -> &mut GearBuffer {
        &mut self.gear_b
    }

    pub fn snapshot(&self) -> InterferenceSnapshot {
        InterferenceSnapshot {
            gear_a: Some(self.gear_a.snapshot()),
            gear_b: Some(self.gear_b.snapshot()),
            offset: Some(self.offset as i64),
        }
    }

    pub fn restore(&mut self, snapshot: &InterferenceSnapshot) {
        if let Some(gear_a) = &snapshot.gear_a {
            self.gear_a.restore(gear_a);
        }
        if let Some(gear_b) = &snapshot.gear_b {
            self.gear_b.restore(gear_b);
        }
        if let Some(offset) = snapshot.offset {
            self.offset = offset.rem_euclid(MAX_STEPS as i64) as usize;
        }
        debug!(
            "Restored engine: gear A {} steps, gear B {} steps, offset {}",
            self.gear_a.len(),
            self.gear_b.len(),
            self.offset
        );
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn restore_json(&mut self, json: &str) -> Result<()> {
        let snapshot: InterferenceSnapshot = serde_json::from_str(json)?;
        self.restore(&snapshot);
        Ok(())
    }
}
