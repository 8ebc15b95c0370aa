//! Scale masks and pitch quantization

use serde::{Deserialize, Serialize};

/// Highest pitch the quantizer accepts (three octaves)
pub const MAX_QUANTIZED_PITCH: i32 = 36;

/// Scale/mode types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    #[default]
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    HarmonicMinor,
    MelodicMinor,
    PentatonicMajor,
    PentatonicMinor,
    WholeTone,
    Chromatic,
}

impl ScaleMode {
    pub const ALL: [ScaleMode; 13] = [
        Self::Major,
        Self::Minor,
        Self::Dorian,
        Self::Phrygian,
        Self::Lydian,
        Self::Mixolydian,
        Self::Locrian,
        Self::HarmonicMinor,
        Self::MelodicMinor,
        Self::PentatonicMajor,
        Self::PentatonicMinor,
        Self::WholeTone,
        Self::Chromatic,
    ];

    /// Scale by switch position, clamped into the list
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// Get scale intervals (semitones from root)
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Self::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Self::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Self::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Self::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Self::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Self::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Self::PentatonicMajor => &[0, 2, 4, 7, 9],
            Self::PentatonicMinor => &[0, 3, 5, 7, 10],
            Self::WholeTone => &[0, 2, 4, 6, 8, 10],
            Self::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }

    pub fn mask(&self) -> ScaleMask {
        ScaleMask::from_intervals(self.intervals())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::Minor => "Minor",
            Self::Dorian => "Dorian",
            Self::Phrygian => "Phrygian",
            Self::Lydian => "Lydian",
            Self::Mixolydian => "Mixolydian",
            Self::Locrian => "Locrian",
            Self::HarmonicMinor => "Harmonic Minor",
            Self::MelodicMinor => "Melodic Minor",
            Self::PentatonicMajor => "Pentatonic Major",
            Self::PentatonicMinor => "Pentatonic Minor",
            Self::WholeTone => "Whole Tone",
            Self::Chromatic => "Chromatic",
        }
    }
}

/// Set of pitch classes relative to the root; bit n = n semitones up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleMask(u16);

impl Default for ScaleMask {
    fn default() -> Self {
        ScaleMode::default().mask()
    }
}

impl ScaleMask {
    pub const CHROMATIC: ScaleMask = ScaleMask(0x0fff);

    /// Mask from raw bits; only the low 12 are kept
    pub fn from_bits(bits: u16) -> Self {
        Self(bits & 0x0fff)
    }

    pub fn from_intervals(intervals: &[u8]) -> Self {
        Self::from_bits(intervals.iter().fold(0, |mask, &i| mask | 1u16 << (i % 12)))
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether `degree` semitones above the root is in the set
    pub fn contains(&self, degree: i32) -> bool {
        (self.0 >> degree.rem_euclid(12)) & 1 == 1
    }

    /// Decode a scale bus: channels 0-11 carry the pitch classes (high above
    /// 0.5 V), channel 15 the root as 1V/oct.
    ///
    /// Returns `None` when fewer than 12 channels are present.
    pub fn from_bus(voltages: &[f32]) -> Option<(Self, Option<i32>)> {
        if voltages.len() < 12 {
            return None;
        }

        let bits = voltages[..12]
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.5)
            .fold(0u16, |mask, (i, _)| mask | 1u16 << i);

        let root = voltages
            .get(15)
            .map(|v| ((v * 12.0).round() as i32).rem_euclid(12));

        Some((Self(bits), root))
    }
}

/// Snap `pitch` into the scale built on `root`.
///
/// Pitch is clamped to `0..=MAX_QUANTIZED_PITCH` first. Out-of-scale notes move
/// to the nearest scale note, lower neighbour winning ties. An empty mask
/// leaves the pitch as is.
pub fn quantize(pitch: i32, root: i32, mask: ScaleMask) -> i32 {
    let pitch = pitch.clamp(0, MAX_QUANTIZED_PITCH);
    let in_scale = |p: i32| mask.contains(p - root);

    if in_scale(pitch) || mask.is_empty() {
        return pitch;
    }

    for distance in 1..=6 {
        let lower = pitch - distance;
        if lower >= 0 && in_scale(lower) {
            return lower;
        }
        let upper = pitch + distance;
        if in_scale(upper) {
            return upper;
        }
    }

    pitch
}
