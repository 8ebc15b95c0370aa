//! Rotating fixed-capacity step buffers ("gears")
//!
//! A gear holds up to [`MAX_STEPS`] integer steps of one [`GearKind`] and a
//! playhead that wraps at the active length. Storage is a fixed array, so
//! nothing on the step path allocates.

use std::ops::RangeInclusive;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::euclidean::Distribution;

/// Capacity of every gear
pub const MAX_STEPS: usize = 16;

/// What a gear stores; fixes default value, clamp range and randomization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GearKind {
    /// Semitones 0..=24
    Pitch,
    /// Semitone offsets -12..=12
    Offset,
    /// On/off as 0 or 1
    Gate,
}

impl GearKind {
    pub fn default_value(self) -> i32 {
        match self {
            Self::Pitch => 12,
            Self::Offset => 0,
            Self::Gate => 1,
        }
    }

    pub fn range(self) -> RangeInclusive<i32> {
        match self {
            Self::Pitch => 0..=24,
            Self::Offset => -12..=12,
            Self::Gate => 0..=1,
        }
    }

    /// Normalize a value into this kind's range. Any non-zero gate is on.
    pub fn clamp(self, value: i32) -> i32 {
        match self {
            Self::Gate => i32::from(value != 0),
            _ => value.clamp(*self.range().start(), *self.range().end()),
        }
    }

    fn random_value(self, rng: &mut fastrand::Rng) -> i32 {
        match self {
            Self::Pitch => rng.i32(self.range()),
            // Normal(0, 4): small offsets are far more likely than wide ones
            Self::Offset => {
                let u1 = rng.f32().max(f32::MIN_POSITIVE);
                let u2 = rng.f32();
                let z = (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos();
                self.clamp((z * 4.0).round() as i32)
            }
            Self::Gate => i32::from(rng.bool()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pitch => "Pitch",
            Self::Offset => "Offset",
            Self::Gate => "Gate",
        }
    }
}

/// Persisted form of a gear. Absent fields leave the live value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GearSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    /// Step values; a `None` entry leaves that slot untouched
    #[serde(
        default,
        deserialize_with = "lenient_steps",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Vec<Option<i64>>>,
}

/// Reals are truncated; entries that are not numbers come back as `None`
fn lenient_steps<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<Option<i64>>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(values.map(|values| {
        values
            .iter()
            .map(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .collect()
    }))
}

/// A rotating step buffer with variable active length
#[derive(Debug, Clone, PartialEq)]
pub struct GearBuffer {
    kind: GearKind,
    length: usize,
    position: usize,
    data: [i32; MAX_STEPS],
}

impl Default for GearBuffer {
    fn default() -> Self {
        Self::new(MAX_STEPS, GearKind::Pitch)
    }
}

impl GearBuffer {
    /// Create a gear with every slot at the kind's default. Length is clamped
    /// to `1..=MAX_STEPS`.
    pub fn new(length: usize, kind: GearKind) -> Self {
        Self {
            kind,
            length: length.clamp(1, MAX_STEPS),
            position: 0,
            data: [kind.default_value(); MAX_STEPS],
        }
    }

    pub fn kind(&self) -> GearKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        MAX_STEPS
    }

    pub fn len(&self) -> usize {
        self.length
    }

    /// Always false; a gear has at least one step
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the playhead one step, wrapping at the active length
    pub fn advance(&mut self) {
        self.position = (self.position + 1) % self.length;
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position % self.length;
    }

    /// Change the active length.
    ///
    /// Growing re-initializes the newly exposed steps to the default value.
    /// Shrinking keeps the hidden steps as they were.
    pub fn set_length(&mut self, length: usize) {
        let old = self.length;
        self.length = length.clamp(1, MAX_STEPS);

        if self.length > old {
            let default = self.kind.default_value();
            self.data[old..self.length].fill(default);
        }

        self.position %= self.length;
    }

    /// Value under the playhead
    pub fn value(&self) -> i32 {
        self.data[self.position]
    }

    pub fn pitch(&self) -> i32 {
        self.value()
    }

    pub fn offset(&self) -> i32 {
        self.value()
    }

    pub fn gate(&self) -> bool {
        self.value() != 0
    }

    /// Value at `step`, taken modulo the active length
    pub fn value_at(&self, step: usize) -> i32 {
        self.data[step % self.length]
    }

    /// Store `value` at `step` (modulo the active length), clamped to the kind
    pub fn set_value_at(&mut self, step: usize, value: i32) {
        self.data[step % self.length] = self.kind.clamp(value);
    }

    /// All slots, including the ones past the active length
    pub fn data(&self) -> &[i32; MAX_STEPS] {
        &self.data
    }

    /// Active slots only
    pub fn active(&self) -> &[i32] {
        &self.data[..self.length]
    }

    /// Refill every active step from the kind's distribution
    pub fn randomize(&mut self, rng: &mut fastrand::Rng) {
        let kind = self.kind;
        for slot in &mut self.data[..self.length] {
            *slot = kind.random_value(rng);
        }
        debug!("Randomized {} gear ({} steps)", kind.name(), self.length);
    }

    /// Rewrite the gear as `hits` gates spread over `slots` steps using the
    /// legacy merge procedure. `slots` becomes the new length.
    pub fn generate_even_distribution(&mut self, hits: usize, slots: usize) {
        self.generate_with(hits, slots, Distribution::Legacy);
    }

    /// Like [`Self::generate_even_distribution`] with an explicit generator.
    ///
    /// Slots past the new length are zeroed. Only meaningful on a gate gear;
    /// other kinds are left untouched.
    pub fn generate_with(&mut self, hits: usize, slots: usize, distribution: Distribution) {
        if self.kind != GearKind::Gate {
            debug!("Ignoring even distribution on {} gear", self.kind.name());
            return;
        }

        self.length = slots.clamp(1, MAX_STEPS);
        let hits = hits.min(self.length);

        self.data = [0; MAX_STEPS];
        for (slot, hit) in self.data.iter_mut().zip(distribution.generate(hits, self.length)) {
            *slot = i32::from(hit);
        }

        self.position %= self.length;
        debug!(
            "Generated {} distribution: {} hits over {} steps",
            distribution.name(),
            hits,
            self.length
        );
    }

    pub fn snapshot(&self) -> GearSnapshot {
        GearSnapshot {
            length: Some(self.length as i64),
            position: Some(self.position as i64),
            data: Some(self.data.iter().map(|&v| Some(v as i64)).collect()),
        }
    }

    /// Merge a snapshot into this gear.
    ///
    /// Length is clamped to `1..=MAX_STEPS`, position wrapped into
    /// `0..length`, data values clamped to the kind. A short data array only
    /// overwrites the leading slots, and non-numeric entries are skipped.
    pub fn restore(&mut self, snapshot: &GearSnapshot) {
        if let Some(length) = snapshot.length {
            self.length = length.clamp(1, MAX_STEPS as i64) as usize;
        }

        if let Some(position) = snapshot.position {
            self.position = position.rem_euclid(self.length as i64) as usize;
        } else {
            self.position %= self.length;
        }

        if let Some(data) = &snapshot.data {
            for (slot, value) in self.data.iter_mut().zip(data) {
                if let Some(value) = *value {
                    let value = value.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
                    *slot = self.kind.clamp(value);
                }
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Restore from JSON text. The gear is unchanged if the text is malformed.
    pub fn restore_json(&mut self, json: &str) -> Result<()> {
        let snapshot: GearSnapshot = serde_json::from_str(json)?;
        self.restore(&snapshot);
        Ok(())
    }

    /// Build a fresh gear of `kind` from JSON text
    pub fn from_json(kind: GearKind, json: &str) -> Result<Self> {
        let mut gear = Self::new(MAX_STEPS, kind);
        gear.restore_json(json)?;
        Ok(gear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_are_clamped_per_kind() {
        let mut pitch = GearBuffer::new(16, GearKind::Pitch);
        pitch.set_value_at(0, 999);
        pitch.set_value_at(1, -5);
        assert_eq!(pitch.value_at(0), 24);
        assert_eq!(pitch.value_at(1), 0);

        let mut offset = GearBuffer::new(16, GearKind::Offset);
        offset.set_value_at(0, 40);
        offset.set_value_at(1, -40);
        assert_eq!(offset.value_at(0), 12);
        assert_eq!(offset.value_at(1), -12);

        let mut gate = GearBuffer::new(16, GearKind::Gate);
        gate.set_value_at(0, 7);
        gate.set_value_at(1, 0);
        gate.set_value_at(2, -3);
        assert_eq!(&gate.data()[..3], &[1, 0, 1]);
    }

    #[test]
    fn test_step_index_wraps_at_length() {
        let mut gear = GearBuffer::new(5, GearKind::Pitch);
        gear.set_value_at(7, 3);
        assert_eq!(gear.value_at(2), 3);
        assert_eq!(gear.value_at(12), 3);
    }

    #[test]
    fn test_advance_is_cyclic_for_every_length() {
        for length in 1..=MAX_STEPS {
            let mut gear = GearBuffer::new(length, GearKind::Offset);
            gear.set_position(length / 2);
            let start = gear.position();
            for _ in 0..length {
                gear.advance();
            }
            assert_eq!(gear.position(), start, "length {length}");
        }
    }

    #[test]
    fn test_length_is_clamped() {
        assert_eq!(GearBuffer::new(0, GearKind::Pitch).len(), 1);
        assert_eq!(GearBuffer::new(99, GearKind::Pitch).len(), MAX_STEPS);

        let mut gear = GearBuffer::new(8, GearKind::Pitch);
        gear.set_length(0);
        assert_eq!(gear.len(), 1);
        gear.set_length(40);
        assert_eq!(gear.len(), MAX_STEPS);
    }

    #[test]
    fn test_shrink_keeps_hidden_steps_and_grow_resets_them() {
        let mut gear = GearBuffer::new(8, GearKind::Offset);
        gear.set_value_at(6, 5);
        for _ in 0..7 {
            gear.advance();
        }
        assert_eq!(gear.position(), 7);

        gear.set_length(4);
        assert_eq!(gear.position(), 3);
        assert_eq!(gear.data()[6], 5, "hidden step is preserved");

        gear.set_length(8);
        assert_eq!(gear.data()[6], 0, "re-exposed step is reset");
    }

    #[test]
    fn test_randomize_stays_in_range() {
        let mut rng = fastrand::Rng::with_seed(7);
        for kind in [GearKind::Pitch, GearKind::Offset, GearKind::Gate] {
            let mut gear = GearBuffer::new(12, kind);
            for _ in 0..50 {
                gear.randomize(&mut rng);
                assert!(gear.active().iter().all(|v| kind.range().contains(v)));
            }
            // Steps past the active length are not touched
            assert!(gear.data()[12..].iter().all(|&v| v == kind.default_value()));
        }
    }

    #[test]
    fn test_offset_randomization_favors_small_values() {
        let mut rng = fastrand::Rng::with_seed(42);
        let mut gear = GearBuffer::new(16, GearKind::Offset);
        let mut small = 0;
        let mut total = 0;
        for _ in 0..200 {
            gear.randomize(&mut rng);
            small += gear.active().iter().filter(|v| v.abs() <= 4).count();
            total += gear.len();
        }
        // About 68% of a N(0, 4) draw lands within one deviation
        assert!(small * 2 > total, "{small} of {total} within +-4");
    }

    #[test]
    fn test_even_distribution_four_of_sixteen() {
        let mut gear = GearBuffer::new(16, GearKind::Gate);
        gear.generate_even_distribution(4, 16);
        assert_eq!(gear.len(), 16);
        assert_eq!(gear.data().iter().filter(|&&v| v == 1).count(), 4);
    }

    #[test]
    fn test_even_distribution_zero_fills_past_slots() {
        let mut gear = GearBuffer::new(16, GearKind::Gate);
        for _ in 0..10 {
            gear.advance();
        }
        gear.generate_even_distribution(3, 8);
        assert_eq!(gear.len(), 8);
        assert_eq!(gear.position(), 2);
        assert_eq!(gear.active(), &[1, 0, 0, 1, 0, 0, 1, 0]);
        assert!(gear.data()[8..].iter().all(|&v| v == 0));

        gear.generate_even_distribution(0, 16);
        assert!(gear.data().iter().all(|&v| v == 0));

        gear.generate_even_distribution(16, 16);
        assert!(gear.data().iter().all(|&v| v == 1));

        gear.generate_even_distribution(9, 4);
        assert_eq!(gear.active(), &[1, 1, 1, 1]);
    }

    #[test]
    fn test_even_distribution_ignored_on_pitch_gear() {
        let mut gear = GearBuffer::new(16, GearKind::Pitch);
        gear.generate_with(4, 8, Distribution::Bjorklund);
        assert_eq!(gear.len(), 16);
        assert!(gear.data().iter().all(|&v| v == 12));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut gear = GearBuffer::new(11, GearKind::Offset);
        gear.randomize(&mut rng);
        for _ in 0..6 {
            gear.advance();
        }

        let json = gear.to_json().unwrap();
        let restored = GearBuffer::from_json(GearKind::Offset, &json).unwrap();
        assert_eq!(restored.len(), 11);
        assert_eq!(restored.position(), 6);
        assert_eq!(restored.data(), gear.data());
    }

    #[test]
    fn test_restore_is_a_partial_merge() {
        let mut gear = GearBuffer::new(8, GearKind::Pitch);
        gear.set_value_at(0, 3);
        gear.set_position(5);

        gear.restore_json(r#"{"length": 6}"#).unwrap();
        assert_eq!(gear.len(), 6);
        assert_eq!(gear.position(), 5);
        assert_eq!(gear.value_at(0), 3);

        gear.restore_json(r#"{"data": [1, 2]}"#).unwrap();
        assert_eq!(&gear.data()[..3], &[1, 2, 12]);
    }

    #[test]
    fn test_restore_normalizes_out_of_range_state() {
        let mut gear = GearBuffer::new(16, GearKind::Pitch);
        gear.restore_json(r#"{"length": 40, "position": -3, "data": [99, -99]}"#)
            .unwrap();
        assert_eq!(gear.len(), 16);
        assert_eq!(gear.position(), 13);
        assert_eq!(&gear.data()[..2], &[24, 0]);

        gear.restore_json(r#"{"length": 4, "position": 9}"#).unwrap();
        assert_eq!(gear.position(), 1);
    }

    #[test]
    fn test_restore_tolerates_non_integer_steps() {
        let mut gear = GearBuffer::new(16, GearKind::Pitch);
        gear.set_value_at(2, 7);
        gear.restore_json(r#"{"length": 8, "data": [12.0, 14.9, "x", null, 3]}"#)
            .unwrap();
        assert_eq!(gear.len(), 8);
        assert_eq!(&gear.data()[..5], &[12, 14, 7, 12, 3]);
    }

    #[test]
    fn test_malformed_json_leaves_gear_untouched() {
        let mut gear = GearBuffer::new(8, GearKind::Gate);
        let before = gear.clone();
        assert!(gear.restore_json("{not json").is_err());
        assert_eq!(gear, before);
    }
}
