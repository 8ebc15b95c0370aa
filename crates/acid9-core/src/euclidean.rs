//! Even-distribution ("Euclidean") gate patterns
//!
//! Two generators live here. [`legacy_distribution`] is the merge procedure
//! the gate gear has always used: it stops as soon as no rest-led group is
//! left to hand out, so some `(hits, slots)` pairs come out with the right
//! hit count but uneven spacing (5 of 8 gives `10101011`). Stored presets
//! depend on those exact patterns, so it stays the default.
//! [`bjorklund`] is the canonical algorithm for callers that want maximal
//! spacing.

use serde::{Deserialize, Serialize};

/// Which generator a gate gear uses when asked for an even distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Approximate merge procedure, kept for preset compatibility
    #[default]
    Legacy,
    /// Canonical Bjorklund spacing
    Bjorklund,
}

impl Distribution {
    /// Generate `hits` ones among `slots` positions.
    ///
    /// `hits` is clamped to `slots`. Returns exactly `slots` entries.
    pub fn generate(self, hits: usize, slots: usize) -> Vec<bool> {
        match self {
            Self::Legacy => legacy_distribution(hits, slots),
            Self::Bjorklund => bjorklund(hits, slots),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Legacy => "Legacy",
            Self::Bjorklund => "Bjorklund",
        }
    }
}

/// Approximate even distribution by repeated group merging.
///
/// Starts from `hits` singleton `[1]` groups followed by `slots - hits`
/// singleton `[0]` groups. Each round appends the trailing group onto each of
/// the first `min(hit-led, rest-led)` groups. Stops once there are no
/// rest-led groups, nothing was merged, or at most one hit-led group remains.
pub fn legacy_distribution(hits: usize, slots: usize) -> Vec<bool> {
    if slots == 0 {
        return vec![];
    }
    let hits = hits.min(slots);

    let mut groups: Vec<Vec<bool>> = Vec::with_capacity(slots);
    groups.extend((0..hits).map(|_| vec![true]));
    groups.extend((hits..slots).map(|_| vec![false]));

    while groups.len() > 1 {
        let hit_led = groups.iter().filter(|g| g[0]).count();
        let rest_led = groups.len() - hit_led;

        if rest_led == 0 {
            break;
        }

        let merges = hit_led.min(rest_led);
        for i in 0..merges {
            // i stays below the shrinking length since merges <= len / 2
            let Some(tail) = groups.pop() else { break };
            groups[i].extend(tail);
        }

        if merges == 0 || hit_led <= 1 {
            break;
        }
    }

    let mut pattern: Vec<bool> = groups.into_iter().flatten().collect();
    pattern.resize(slots, false);
    pattern
}

/// Canonical Bjorklund even distribution.
///
/// # Example
/// ```
/// use acid9_core::bjorklund;
/// let pattern = bjorklund(3, 8);
/// assert_eq!(pattern, vec![true, false, false, true, false, false, true, false]);
/// ```
pub fn bjorklund(hits: usize, slots: usize) -> Vec<bool> {
    if slots == 0 {
        return vec![];
    }

    let hits = hits.min(slots);

    if hits == 0 {
        return vec![false; slots];
    }

    if hits == slots {
        return vec![true; slots];
    }

    let mut counts = vec![vec![true]; hits];
    let mut remainders = vec![vec![false]; slots - hits];

    loop {
        let pairs = counts.len().min(remainders.len());
        let mut merged = Vec::with_capacity(pairs);
        for i in 0..pairs {
            let mut combined = counts[i].clone();
            combined.extend_from_slice(&remainders[i]);
            merged.push(combined);
        }

        // Whatever was not paired becomes the new remainder
        remainders = if counts.len() > pairs {
            counts.split_off(pairs)
        } else {
            remainders.split_off(pairs)
        };
        counts = merged;

        if remainders.len() <= 1 {
            break;
        }
    }

    counts.into_iter().chain(remainders).flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(pattern: &[bool]) -> String {
        pattern.iter().map(|&b| if b { '1' } else { '0' }).collect()
    }

    #[test]
    fn test_legacy_four_on_sixteen() {
        assert_eq!(bits(&legacy_distribution(4, 16)), "1000100010001000");
    }

    #[test]
    fn test_legacy_tresillo() {
        assert_eq!(bits(&legacy_distribution(3, 8)), "10010010");
    }

    #[test]
    fn test_legacy_early_exit_keeps_hit_count() {
        // Stops once every group is hit-led, leaving two hits side by side
        let pattern = legacy_distribution(5, 8);
        assert_eq!(bits(&pattern), "10101011");
        assert_eq!(pattern.iter().filter(|&&b| b).count(), 5);
    }

    #[test]
    fn test_legacy_extremes() {
        assert!(legacy_distribution(0, 16).iter().all(|&b| !b));
        assert!(legacy_distribution(16, 16).iter().all(|&b| b));
        assert_eq!(legacy_distribution(20, 4), vec![true; 4]);
        assert!(legacy_distribution(3, 0).is_empty());
    }

    #[test]
    fn test_bjorklund_classic_patterns() {
        assert_eq!(bits(&bjorklund(3, 8)), "10010010");
        assert_eq!(bits(&bjorklund(5, 8)), "10110110");
        assert_eq!(bits(&bjorklund(4, 16)), "1000100010001000");
    }

    #[test]
    fn test_hit_count_for_every_pair() {
        for slots in 1..=16 {
            for hits in 0..=slots {
                for dist in [Distribution::Legacy, Distribution::Bjorklund] {
                    let pattern = dist.generate(hits, slots);
                    assert_eq!(pattern.len(), slots, "{} {hits}/{slots}", dist.name());
                    assert_eq!(
                        pattern.iter().filter(|&&b| b).count(),
                        hits,
                        "{} {hits}/{slots}",
                        dist.name()
                    );
                }
            }
        }
    }
}
